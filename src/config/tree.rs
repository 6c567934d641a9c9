//! Generic configuration tree
//!
//! Config fragments from TOML files, JSON files and in-memory overrides are
//! converted into one `ConfigValue` representation and merged with
//! [`deep_merge`]. Maps keep insertion order.

use indexmap::IndexMap;
use serde::Serialize;

/// Ordered mapping of config keys
pub type ConfigMap = IndexMap<String, ConfigValue>;

/// A node in the configuration tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigValue>),
    Map(ConfigMap),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Integer view. Floats truncate, numeric strings parse.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(v) => Some(*v),
            ConfigValue::Float(v) => Some(*v as i64),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// String list view. A lone string counts as a one-element list and
    /// non-string list items are skipped.
    pub fn as_string_list(&self) -> Vec<String> {
        match self {
            ConfigValue::String(s) => vec![s.clone()],
            ConfigValue::List(items) => items
                .iter()
                .filter_map(|item| match item {
                    ConfigValue::String(s) => Some(s.clone()),
                    ConfigValue::Integer(i) => Some(i.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, ConfigValue::Map(_))
    }

    /// Convert a parsed TOML value. Datetimes become their string form.
    pub fn from_toml(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => ConfigValue::String(s),
            toml::Value::Integer(i) => ConfigValue::Integer(i),
            toml::Value::Float(f) => ConfigValue::Float(f),
            toml::Value::Boolean(b) => ConfigValue::Bool(b),
            toml::Value::Datetime(d) => ConfigValue::String(d.to_string()),
            toml::Value::Array(items) => {
                ConfigValue::List(items.into_iter().map(ConfigValue::from_toml).collect())
            }
            toml::Value::Table(table) => ConfigValue::Map(
                table
                    .into_iter()
                    .map(|(k, v)| (k, ConfigValue::from_toml(v)))
                    .collect(),
            ),
        }
    }

    /// Convert a parsed JSON value
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ConfigValue::Null,
            serde_json::Value::Bool(b) => ConfigValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Integer(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => ConfigValue::String(s),
            serde_json::Value::Array(items) => {
                ConfigValue::List(items.into_iter().map(ConfigValue::from_json).collect())
            }
            serde_json::Value::Object(obj) => ConfigValue::Map(
                obj.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Parse a single command-line override value. TOML scalar and inline
    /// array syntax is accepted, anything else is kept as a plain string.
    pub fn parse_override(raw: &str) -> Self {
        let wrapped = format!("v = {}", raw);
        match toml::from_str::<toml::Table>(&wrapped) {
            Ok(mut table) => table
                .remove("v")
                .map(ConfigValue::from_toml)
                .unwrap_or_else(|| ConfigValue::String(raw.to_string())),
            Err(_) => ConfigValue::String(raw.to_string()),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Integer(i)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(m: ConfigMap) -> Self {
        ConfigValue::Map(m)
    }
}

/// Merge `overlay` into `base`.
///
/// Keys present in both as maps merge recursively. Any other collision
/// replaces the base value wholesale, lists included.
pub fn deep_merge(base: &mut ConfigMap, overlay: &ConfigMap) {
    for (key, value) in overlay {
        if let (Some(ConfigValue::Map(base_map)), ConfigValue::Map(overlay_map)) =
            (base.get_mut(key), value)
        {
            deep_merge(base_map, overlay_map);
            continue;
        }
        base.insert(key.clone(), value.clone());
    }
}

/// Expand `a.b.c = v` style keys into nested maps, recursively.
///
/// Expanded entries merge with explicit tables, so the dotted form and the
/// nested-table form of the same settings produce the same tree.
pub fn expand_dotted_keys(map: ConfigMap) -> ConfigMap {
    let mut out = ConfigMap::new();
    for (key, value) in map {
        let value = match value {
            ConfigValue::Map(inner) => ConfigValue::Map(expand_dotted_keys(inner)),
            other => other,
        };

        let segments: Vec<&str> = key.split('.').filter(|s| !s.is_empty()).collect();
        if segments.len() <= 1 {
            let mut single = ConfigMap::new();
            single.insert(key, value);
            deep_merge(&mut out, &single);
            continue;
        }

        let mut nested = value;
        for segment in segments.iter().rev() {
            let mut wrapper = ConfigMap::new();
            wrapper.insert(segment.to_string(), nested);
            nested = ConfigValue::Map(wrapper);
        }
        if let ConfigValue::Map(m) = nested {
            deep_merge(&mut out, &m);
        }
    }
    out
}

/// Look up a dotted path (`scan.ci.tools`) in a map
pub fn get_path<'a>(map: &'a ConfigMap, path: &str) -> Option<&'a ConfigValue> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = map.get(first)?;
    for segment in segments {
        current = current.as_map()?.get(segment)?;
    }
    Some(current)
}

/// Build a single-entry map for a dotted path, e.g. an override from `--set`
pub fn map_from_path(path: &str, value: ConfigValue) -> ConfigMap {
    let mut single = ConfigMap::new();
    single.insert(path.to_string(), value);
    expand_dotted_keys(single)
}

/// Fragment text formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentFormat {
    Toml,
    Json,
}

impl FragmentFormat {
    /// Pick the format from a file extension. Unknown extensions are read as TOML.
    pub fn from_path(path: &std::path::Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("json") => FragmentFormat::Json,
            _ => FragmentFormat::Toml,
        }
    }
}

/// Parse fragment text into a map with dotted keys expanded
pub fn parse_fragment(text: &str, format: FragmentFormat) -> Result<ConfigMap, String> {
    let value = match format {
        FragmentFormat::Toml => {
            let table: toml::Table = toml::from_str(text).map_err(|e| e.to_string())?;
            ConfigValue::from_toml(toml::Value::Table(table))
        }
        FragmentFormat::Json => {
            if text.trim().is_empty() {
                return Ok(ConfigMap::new());
            }
            let json: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
            ConfigValue::from_json(json)
        }
    };

    match value {
        ConfigValue::Map(map) => Ok(expand_dotted_keys(map)),
        _ => Err("top level of a config fragment must be a table".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toml_map(text: &str) -> ConfigMap {
        parse_fragment(text, FragmentFormat::Toml).expect("parse toml")
    }

    #[test]
    fn test_merge_later_scalar_wins() {
        let a = toml_map("key = 'a'\nonly_a = 1");
        let b = toml_map("key = 'b'");

        let mut ab = ConfigMap::new();
        deep_merge(&mut ab, &a);
        deep_merge(&mut ab, &b);
        assert_eq!(ab["key"], ConfigValue::from("b"));
        assert_eq!(ab["only_a"], ConfigValue::Integer(1));

        let mut ba = ConfigMap::new();
        deep_merge(&mut ba, &b);
        deep_merge(&mut ba, &a);
        assert_eq!(ba["key"], ConfigValue::from("a"));
    }

    #[test]
    fn test_merge_nested_maps_key_by_key() {
        let mut base = toml_map("[bandit]\nDEFAULT_SEVERITY = 'low'\nTIMEOUT = 10");
        let overlay = toml_map("[bandit]\nTIMEOUT = 99");
        deep_merge(&mut base, &overlay);

        let bandit = base["bandit"].as_map().unwrap();
        assert_eq!(bandit["DEFAULT_SEVERITY"], ConfigValue::from("low"));
        assert_eq!(bandit["TIMEOUT"], ConfigValue::Integer(99));
    }

    #[test]
    fn test_merge_lists_replace() {
        let mut base = toml_map("EXCLUDE = ['a/', 'b/']");
        let overlay = toml_map("EXCLUDE = ['c/']");
        deep_merge(&mut base, &overlay);
        assert_eq!(base["EXCLUDE"].as_string_list(), vec!["c/".to_string()]);
    }

    #[test]
    fn test_merge_map_replaces_scalar() {
        let mut base = toml_map("bandit = 'off'");
        let overlay = toml_map("[bandit]\nTIMEOUT = 5");
        deep_merge(&mut base, &overlay);
        assert!(base["bandit"].is_map());
    }

    #[test]
    fn test_dot_format_matches_nested_tables() {
        let dotted = toml_map(
            r#"
"bandit.DEFAULT_SEVERITY" = "high"
"bandit.quick.TIMEOUT" = 5
"#,
        );
        let nested = toml_map(
            r#"
[bandit]
DEFAULT_SEVERITY = "high"

[bandit.quick]
TIMEOUT = 5
"#,
        );
        assert_eq!(dotted, nested);
    }

    #[test]
    fn test_dotted_keys_merge_with_tables() {
        let map = toml_map(
            r#"
"semgrep.TIMEOUT" = 30

[semgrep]
CONFIGS = ["p/ci"]
"#,
        );
        let semgrep = map["semgrep"].as_map().unwrap();
        assert_eq!(semgrep.len(), 2);
    }

    #[test]
    fn test_json_fragment() {
        let map = parse_fragment(
            r#"{"safety": {"some": "key", "n": 3, "f": 1.5, "none": null}}"#,
            FragmentFormat::Json,
        )
        .unwrap();
        let safety = map["safety"].as_map().unwrap();
        assert_eq!(safety["some"].as_str(), Some("key"));
        assert_eq!(safety["n"].as_i64(), Some(3));
        assert_eq!(safety["f"], ConfigValue::Float(1.5));
        assert_eq!(safety["none"], ConfigValue::Null);
    }

    #[test]
    fn test_malformed_fragment_is_error() {
        assert!(parse_fragment("this is [[ not toml", FragmentFormat::Toml).is_err());
        assert!(parse_fragment("{not json", FragmentFormat::Json).is_err());
        assert!(parse_fragment("[1, 2]", FragmentFormat::Json).is_err());
    }

    #[test]
    fn test_get_path() {
        let map = toml_map("[scan.ci]\ntools = ['bandit']");
        let tools = get_path(&map, "scan.ci.tools").unwrap();
        assert_eq!(tools.as_string_list(), vec!["bandit".to_string()]);
        assert!(get_path(&map, "scan.dev.tools").is_none());
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(ConfigValue::parse_override("5"), ConfigValue::Integer(5));
        assert_eq!(ConfigValue::parse_override("true"), ConfigValue::Bool(true));
        assert_eq!(
            ConfigValue::parse_override("['a', 'b']").as_string_list(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(ConfigValue::parse_override("high"), ConfigValue::from("high"));
    }

    #[test]
    fn test_map_from_path() {
        let map = map_from_path("bandit.quick.TIMEOUT", ConfigValue::Integer(3));
        assert_eq!(
            get_path(&map, "bandit.quick.TIMEOUT"),
            Some(&ConfigValue::Integer(3))
        );
    }

    #[test]
    fn test_format_from_path() {
        use std::path::Path;
        assert_eq!(FragmentFormat::from_path(Path::new("a.json")), FragmentFormat::Json);
        assert_eq!(FragmentFormat::from_path(Path::new("a.toml")), FragmentFormat::Toml);
        assert_eq!(FragmentFormat::from_path(Path::new(".scanhub")), FragmentFormat::Toml);
    }
}
