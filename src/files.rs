//! Discovered files of the scan target
//!
//! The directory walk happens once per run. The resulting `FileIndex` is
//! passed to whatever needs path lookups; there is no global cache.

use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension to language, used to decide which language tool lists apply
const LANGUAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("py", "python"),
    ("js", "node"),
    ("jsx", "node"),
    ("ts", "node"),
    ("tsx", "node"),
    ("java", "java"),
    ("kt", "java"),
    ("cs", "dotnet"),
    ("go", "go"),
    ("rs", "rust"),
    ("rb", "ruby"),
    ("php", "php"),
];

/// Manifest file name to language
const LANGUAGE_MANIFESTS: &[(&str, &str)] = &[
    ("requirements.txt", "python"),
    ("pyproject.toml", "python"),
    ("Pipfile", "python"),
    ("package.json", "node"),
    ("pom.xml", "java"),
    ("build.gradle", "java"),
    ("go.mod", "go"),
    ("Cargo.toml", "rust"),
    ("Gemfile", "ruby"),
    ("composer.json", "php"),
];

/// Files under a scan root, relative to that root
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl FileIndex {
    /// Walk `root`, respecting .gitignore and skipping hidden files
    pub fn discover(root: &Path) -> Self {
        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .build();

        let mut files: Vec<PathBuf> = walker
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
            .map(|e| {
                e.path()
                    .strip_prefix(root)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| e.path().to_path_buf())
            })
            .collect();
        files.sort();

        debug!("Indexed {} files under {}", files.len(), root.display());
        Self {
            root: root.to_path_buf(),
            files,
        }
    }

    /// Index over a known file list (tests, callers with their own walk)
    pub fn from_paths(root: impl Into<PathBuf>, files: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Languages present, from source extensions and manifest files
    pub fn detect_languages(&self) -> BTreeSet<String> {
        let mut languages = BTreeSet::new();
        for path in &self.files {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                let ext = ext.to_lowercase();
                if let Some((_, lang)) = LANGUAGE_EXTENSIONS.iter().find(|(e, _)| *e == ext) {
                    languages.insert(lang.to_string());
                }
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if let Some((_, lang)) = LANGUAGE_MANIFESTS.iter().find(|(m, _)| *m == name) {
                    languages.insert(lang.to_string());
                }
            }
        }
        languages
    }

    /// Whether a language scope should run. Languages the index knows nothing
    /// about are assumed present.
    pub fn has_language(&self, language: &str) -> bool {
        let known = LANGUAGE_EXTENSIONS
            .iter()
            .chain(LANGUAGE_MANIFESTS)
            .any(|(_, lang)| *lang == language);
        !known || self.detect_languages().contains(language)
    }
}
