use super::*;
use crate::config::tree::FragmentFormat;

fn toml_map(text: &str) -> ConfigMap {
    parse_fragment(text, FragmentFormat::Toml).expect("parse toml")
}

fn json_map(text: &str) -> ConfigMap {
    parse_fragment(text, FragmentFormat::Json).expect("parse json")
}

#[test]
fn test_scan_type_override() {
    let store = ConfigStore::from_map(json_map(
        r#"{"safety": {"some": "key"}, "scan": {"dev": {"safety": {"some": "change"}}}}"#,
    ));
    let resolved = store.get_plugin_config("safety", Some("dev"), None, None);
    assert_eq!(resolved, json_map(r#"{"some": "change"}"#));
}

#[test]
fn test_base_plugin_config() {
    let store = ConfigStore::from_map(json_map(r#"{"safety": {"some": "key"}}"#));
    let resolved = store.get_plugin_config("safety", None, None, None);
    assert_eq!(resolved["some"].as_str(), Some("key"));
}

#[test]
fn test_unknown_plugin_is_empty() {
    let store = ConfigStore::from_map(json_map(r#"{"safety": {"some": "key"}}"#));
    assert!(store.get_plugin_config("bandit", None, None, None).is_empty());
}

#[test]
fn test_run_type_notations_are_equivalent() {
    let store = ConfigStore::from_map(json_map(
        r#"{
            "safety": {"some": "key", "other": "base", "quick": {"some": "nested"}},
            "safety_quick": {"other": "flat"}
        }"#,
    ));
    let colon = store.get_plugin_config("safety:quick", None, None, None);
    let flat = store.get_plugin_config("safety_quick", None, None, None);
    let explicit = store.get_plugin_config("safety", None, Some("quick"), None);

    assert_eq!(colon, flat);
    assert_eq!(colon, explicit);
    assert_eq!(colon["some"].as_str(), Some("nested"));
    assert_eq!(colon["other"].as_str(), Some("flat"));
}

#[test]
fn test_flat_run_type_wins_over_nested() {
    let store = ConfigStore::from_map(json_map(
        r#"{
            "safety": {"special": {"level": "nested"}},
            "safety_special": {"level": "flat"}
        }"#,
    ));
    let resolved = store.get_plugin_config("safety:special", None, None, None);
    assert_eq!(resolved["level"].as_str(), Some("flat"));
}

#[test]
fn test_run_type_in_scan_scope() {
    let store = ConfigStore::from_map(toml_map(
        r#"
[safety]
level = "base"

[scan.ci.safety]
level = "ci"

[scan.ci.safety.quick]
level = "ci-nested"

[scan.ci.safety_quick]
extra = true
"#,
    ));
    let resolved = store.get_plugin_config("safety:quick", Some("ci"), None, None);
    assert_eq!(resolved["level"].as_str(), Some("ci-nested"));
    assert_eq!(resolved["extra"], ConfigValue::Bool(true));

    let plain = store.get_plugin_config("safety", Some("ci"), None, None);
    assert_eq!(plain["level"].as_str(), Some("ci"));
}

#[test]
fn test_language_scope_applies_last() {
    let store = ConfigStore::from_map(toml_map(
        r#"
[bandit]
DEFAULT_SEVERITY = "low"
TIMEOUT = 10

[scan.ci.bandit]
DEFAULT_SEVERITY = "medium"

[python.bandit]
DEFAULT_SEVERITY = "high"
"#,
    ));
    let resolved = store.get_plugin_config("bandit", Some("ci"), None, Some("python"));
    assert_eq!(resolved["DEFAULT_SEVERITY"].as_str(), Some("high"));
    assert_eq!(resolved["TIMEOUT"].as_i64(), Some(10));

    let no_lang = store.get_plugin_config("bandit", Some("ci"), None, None);
    assert_eq!(no_lang["DEFAULT_SEVERITY"].as_str(), Some("medium"));
}

#[test]
fn test_missing_scan_type_is_ignored() {
    let store = ConfigStore::from_map(json_map(r#"{"safety": {"some": "key"}}"#));
    let resolved = store.get_plugin_config("safety", Some("nope"), None, Some("rust"));
    assert_eq!(resolved["some"].as_str(), Some("key"));
}

#[test]
fn test_parse_plugin_id() {
    let store = ConfigStore::from_map(json_map(r#"{"safety": {}, "npm_audit": {}}"#));

    assert_eq!(
        store.parse_plugin_id("safety:quick", None),
        PluginId::new("safety", Some("quick".into()))
    );
    assert_eq!(
        store.parse_plugin_id("safety_quick", None),
        PluginId::new("safety", Some("quick".into()))
    );
    // No "npm" section, so the underscore belongs to the plugin name
    assert_eq!(store.parse_plugin_id("npm_audit", None), PluginId::new("npm_audit", None));
    assert_eq!(
        store.parse_plugin_id("safety:quick", Some("slow")),
        PluginId::new("safety", Some("slow".into()))
    );
    assert_eq!(store.parse_plugin_id("safety:quick", None).to_string(), "safety:quick");
}

#[test]
fn test_flat_run_type_resolves_from_scoped_sections() {
    let store = ConfigStore::from_map(toml_map(
        r#"
[scan.ci.safety.quick]
x = 1

[python.bandit.quick]
y = 2
"#,
    ));

    let colon = store.get_plugin_config("safety:quick", Some("ci"), None, None);
    let flat = store.get_plugin_config("safety_quick", Some("ci"), None, None);
    assert_eq!(flat, colon);
    assert_eq!(flat["x"].as_i64(), Some(1));

    let colon = store.get_plugin_config("bandit:quick", None, None, Some("python"));
    let flat = store.get_plugin_config("bandit_quick", None, None, Some("python"));
    assert_eq!(flat, colon);
    assert_eq!(flat["y"].as_i64(), Some(2));
}

#[test]
fn test_registered_plugins_split_without_config() {
    let mut store = ConfigStore::default();
    assert_eq!(store.parse_plugin_id("bandit_quick", None), PluginId::new("bandit_quick", None));

    store.register_plugins(["bandit", "npm_audit"]);
    assert_eq!(
        store.parse_plugin_id("bandit_quick", None),
        PluginId::new("bandit", Some("quick".into()))
    );
    // A registered name is never split, even with a matching prefix
    store.register_plugins(["npm"]);
    assert_eq!(store.parse_plugin_id("npm_audit", None), PluginId::new("npm_audit", None));
}

#[test]
fn test_get_scan_config() {
    let store = ConfigStore::from_map(toml_map(
        r#"
[scan]
tools = ["semgrep", "bandit:quick"]
reporters = ["console"]

[scan.ci]
reporters = ["console", "sarif"]
FAIL_ON_SEVERITY = "high"
"#,
    ));

    let scan = store.get_scan_config(None).unwrap();
    assert_eq!(scan.tools, vec!["semgrep", "bandit:quick"]);
    assert_eq!(scan.reporters, vec!["console"]);
    assert!(scan.languages.is_empty());
    assert!(scan.fail_on_severity.is_none());

    let ci = store.get_scan_config(Some("ci")).unwrap();
    assert_eq!(ci.reporters, vec!["console", "sarif"]);
    assert_eq!(ci.fail_on_severity.as_deref(), Some("high"));
}

#[test]
fn test_get_scan_config_languages_only() {
    let store = ConfigStore::from_map(toml_map(
        "[scan]\nlanguages = ['python']\nreporters = ['json']\n[python]\ntools = ['bandit']",
    ));
    let scan = store.get_scan_config(None).unwrap();
    assert_eq!(scan.languages, vec!["python"]);
    assert_eq!(store.language_tools("python"), vec!["bandit"]);
    assert!(store.language_tools("go").is_empty());
}

#[test]
fn test_get_scan_config_missing_keys() {
    let empty = ConfigStore::default();
    let err = empty.get_scan_config(None).unwrap_err();
    assert!(matches!(err, ConfigError::MissingKey { ref key, .. } if key == "scan.tools"));

    let no_tools = ConfigStore::from_map(toml_map("[scan]\nreporters = ['console']"));
    let err = no_tools.get_scan_config(None).unwrap_err();
    assert!(err.to_string().contains("scanhub init"));

    let no_reporters = ConfigStore::from_map(toml_map("[scan]\ntools = ['bandit']"));
    let err = no_reporters.get_scan_config(None).unwrap_err();
    assert!(matches!(err, ConfigError::MissingKey { ref key, .. } if key == "scan.reporters"));
}

#[test]
fn test_load_files_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.toml");
    let second = dir.path().join("second.json");
    std::fs::write(&first, "[bandit]\nDEFAULT_SEVERITY = 'low'\nTIMEOUT = 5").unwrap();
    std::fs::write(&second, r#"{"bandit": {"DEFAULT_SEVERITY": "high"}}"#).unwrap();

    let store = ConfigStore::load([first.clone(), second.clone()]);
    let bandit = store.get_plugin_config("bandit", None, None, None);
    assert_eq!(bandit["DEFAULT_SEVERITY"].as_str(), Some("high"));
    assert_eq!(bandit["TIMEOUT"].as_i64(), Some(5));
    assert_eq!(store.sources(), &[first.clone(), second.clone()]);

    let reversed = ConfigStore::load([second, first]);
    let bandit = reversed.get_plugin_config("bandit", None, None, None);
    assert_eq!(bandit["DEFAULT_SEVERITY"].as_str(), Some("low"));
}

#[test]
fn test_load_skips_broken_fragment_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.toml");
    let broken = dir.path().join("broken.toml");
    let later = dir.path().join("later.toml");
    std::fs::write(&good, "[safety]\na = 1").unwrap();
    std::fs::write(&broken, "this is [[ not valid toml {{{}}}").unwrap();
    std::fs::write(&later, "[safety]\nb = 2").unwrap();

    let store = ConfigStore::load([good, broken, later]);
    let safety = store.get_plugin_config("safety", None, None, None);
    assert_eq!(safety["a"].as_i64(), Some(1));
    assert_eq!(safety["b"].as_i64(), Some(2));
    assert_eq!(store.warnings().len(), 1);
    assert!(store.warnings()[0].contains("broken.toml"));
}

#[test]
fn test_missing_file_is_empty_fragment() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::load([dir.path().join("does-not-exist.toml")]);
    assert!(store.tree().is_empty());
    assert!(store.warnings().is_empty());
}

#[test]
fn test_mixed_fragments() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("c.toml");
    std::fs::write(&file, "[semgrep]\nTIMEOUT = 100").unwrap();

    let overrides = crate::config::tree::map_from_path("semgrep.TIMEOUT", ConfigValue::Integer(7));
    let store = ConfigStore::load([ConfigFragment::File(file), ConfigFragment::Map(overrides)]);
    let semgrep = store.get_plugin_config("semgrep", None, None, None);
    assert_eq!(semgrep["TIMEOUT"].as_i64(), Some(7));
}

#[test]
fn test_example_config_is_valid() {
    let store = ConfigStore::from_map(toml_map(EXAMPLE_LOCAL_CONFIG));
    let scan = store.get_scan_config(Some("ci")).unwrap();
    assert_eq!(scan.reporters, vec!["console", "sarif"]);
    assert_eq!(store.language_tools("python"), vec!["bandit"]);
}

#[test]
fn test_write_example_config_once() {
    let dir = tempfile::tempdir().unwrap();
    let (path, created) = write_example_config(dir.path()).unwrap();
    assert!(created);
    assert!(path.exists());
    let (_, created_again) = write_example_config(dir.path()).unwrap();
    assert!(!created_again);
}
