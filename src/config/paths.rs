//! Well-known config file locations
//!
//! - global: `~/.scanhub/config.toml`
//! - local: `.scanhub.toml` in the current working directory
//!
//! Both are optional. A missing file is an empty fragment.

use std::path::{Path, PathBuf};

/// Directory under the home directory holding the global config
pub const GLOBAL_CONFIG_DIR: &str = ".scanhub";
/// File name of the global config
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";
/// File name of the local (per-project) config
pub const LOCAL_CONFIG_FILE: &str = ".scanhub.toml";

/// Global config path, if a home directory can be determined
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

/// Local config path in the current working directory
pub fn local_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| local_config_path_in(&cwd))
}

/// Local config path inside `dir`
pub fn local_config_path_in(dir: &Path) -> PathBuf {
    dir.join(LOCAL_CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_path_shape() {
        if let Some(p) = global_config_path() {
            assert!(p.ends_with(".scanhub/config.toml"));
        }
    }

    #[test]
    fn test_local_path_in_dir() {
        let p = local_config_path_in(Path::new("/tmp/project"));
        assert_eq!(p, PathBuf::from("/tmp/project/.scanhub.toml"));
    }
}
