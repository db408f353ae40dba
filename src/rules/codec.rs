//! Conversion between rule records and the persisted group schema
//!
//! A group is a flat TOML table: `<field> = value` and, for fields carrying a
//! policy, `<field>Policy = <int>`. A disabled field is written as policy `0`
//! (unused) or, for fields without a policy, as an empty string.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toml::Value;
use tracing::{debug, info};

use crate::constants::rulebook::{DELETE_KEY, EXPORT_EXTENSION, UNUSED_POLICY};

use super::catalog::{FieldSpec, RuleFieldCatalog};
use super::item::RuleItem;
use super::record::RuleRecord;
use super::value::{PolicyKind, PolicyValue, TypedValue};

/// One persisted rule group
pub type RawGroup = toml::Table;

/// Build a record from a persisted group. Bad fields reset individually.
pub fn decode(group: &RawGroup) -> RuleRecord {
    let items = RuleFieldCatalog::fields()
        .iter()
        .map(|spec| decode_item(spec, group))
        .collect();
    RuleRecord::from_items(items)
}

fn decode_item(spec: &'static FieldSpec, group: &RawGroup) -> RuleItem {
    let mut item = RuleItem::new(spec);
    item.reset();

    let Some(raw) = group.get(spec.key) else {
        return item;
    };
    if matches!(raw, Value::String(s) if s.is_empty()) {
        return item;
    }

    let policy = match (spec.policy, spec.policy_key()) {
        (PolicyKind::None, _) => Some(PolicyValue::None),
        (kind, Some(policy_key)) => group
            .get(&policy_key)
            .and_then(Value::as_integer)
            .filter(|raw| *raw != UNUSED_POLICY)
            .and_then(|raw| kind.from_raw(raw)),
        (_, None) => None,
    };
    let Some(policy) = policy else {
        return item;
    };

    let Some(value) = value_from_toml(raw).and_then(|value| value.coerce(spec.kind)) else {
        debug!(key = spec.key, raw = %raw, "Malformed rule value, resetting field");
        return item;
    };

    item.set_enabled(true);
    item.set_value(value);
    item.set_policy(policy);
    item
}

/// Serialize a record into a persisted group, in catalog order
pub fn encode(record: &RuleRecord) -> RawGroup {
    let mut group = RawGroup::new();

    for item in record.items() {
        let spec = item.spec();
        let policy_key = spec.policy_key();

        if item.is_enabled() {
            let value = if spec.key == "description" {
                // An empty description is persisted as the derived one
                Value::String(record.description().to_string())
            } else {
                value_to_toml(item.value())
            };
            group.insert(spec.key.to_string(), value);
            if let Some(policy_key) = policy_key {
                group.insert(policy_key, Value::Integer(item.policy().to_raw()));
            }
        } else if let Some(policy_key) = policy_key {
            group.insert(policy_key, Value::Integer(UNUSED_POLICY));
        } else {
            group.insert(spec.key.to_string(), Value::String(String::new()));
        }
    }

    group
}

fn value_from_toml(raw: &Value) -> Option<TypedValue> {
    match raw {
        Value::String(s) => Some(TypedValue::String(s.clone())),
        Value::Integer(n) => Some(TypedValue::Integer(*n)),
        Value::Boolean(b) => Some(TypedValue::Boolean(*b)),
        Value::Float(f) => Some(TypedValue::Integer(f.round() as i64)),
        _ => None,
    }
}

fn value_to_toml(value: &TypedValue) -> Value {
    match value {
        TypedValue::String(s) | TypedValue::Option(s) | TypedValue::Shortcut(s) => Value::String(s.clone()),
        TypedValue::Boolean(b) => Value::Boolean(*b),
        TypedValue::Integer(n) => Value::Integer(*n),
        TypedValue::Percentage(p) => Value::Integer(*p as i64),
        TypedValue::FlagsOption(mask) => Value::Integer(*mask as i64),
        TypedValue::Coordinate(..) => Value::String(value.to_string()),
    }
}

/// Standalone document holding one rule, keyed by its description
pub fn export_document(record: &RuleRecord) -> toml::Table {
    let mut document = toml::Table::new();
    document.insert(record.description().to_string(), Value::Table(encode(record)));
    document
}

/// Write one rule to a standalone export file
pub fn write_export(record: &RuleRecord, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(&export_document(record))
        .context("Failed to serialize exported rule to TOML")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create export directory {:?}", parent))?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write exported rule to {:?}", path))?;

    info!(path = %path.display(), description = %record.description(), "Exported window rule");
    Ok(())
}

/// Suggested export location for a rule description inside `dir`
pub fn export_path(dir: &Path, description: &str) -> PathBuf {
    let file_stem: String = description
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    dir.join(format!("{file_stem}.{EXPORT_EXTENSION}"))
}

/// One group read from an import file
#[derive(Debug, Clone, PartialEq)]
pub struct ImportEntry {
    pub description: String,
    pub record: RuleRecord,
    /// The group asks for the matching rule to be deleted
    pub delete: bool,
}

/// Interpret every group of an import document, skipping groups without a description
pub fn parse_import(document: &toml::Table) -> Vec<ImportEntry> {
    document
        .iter()
        .filter_map(|(name, value)| {
            let Some(group) = value.as_table() else {
                debug!(group = %name, "Skipping non-table entry in import file");
                return None;
            };

            let description = group.get("description").and_then(Value::as_str).unwrap_or("");
            if description.is_empty() {
                debug!(group = %name, "Skipping imported group without description");
                return None;
            }

            Some(ImportEntry {
                description: description.to_string(),
                record: decode(group),
                delete: group.get(DELETE_KEY).and_then(Value::as_bool).unwrap_or(false),
            })
        })
        .collect()
}

/// Read and parse an import file in full
pub fn read_import(path: &Path) -> Result<Vec<ImportEntry>> {
    let contents = fs::read_to_string(path).with_context(|| format!("Failed to read rules from {:?}", path))?;
    let document: toml::Table =
        toml::from_str(&contents).with_context(|| format!("Failed to parse TOML from {:?}", path))?;
    Ok(parse_import(&document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::value::{ApplyPolicy, MatchPolicy};

    /// A record touching every value kind
    fn full_record() -> RuleRecord {
        let mut record = RuleRecord::new();
        record.set_value("description", TypedValue::String("Editor windows".into()));
        record.set_value("wmclass", TypedValue::String("kate".into()));
        record.set_policy("wmclass", PolicyValue::Match(MatchPolicy::Exact));
        record.set_value("types", TypedValue::FlagsOption(1));

        let enable = [
            ("title", TypedValue::String("Session".into()), PolicyValue::Match(MatchPolicy::Substring)),
            ("position", TypedValue::Coordinate(10, -20), PolicyValue::Apply(ApplyPolicy::Remember)),
            ("above", TypedValue::Boolean(true), PolicyValue::Apply(ApplyPolicy::Force)),
            ("screen", TypedValue::Integer(2), PolicyValue::Apply(ApplyPolicy::Apply)),
            ("placement", TypedValue::Option("Centered".into()), PolicyValue::Apply(ApplyPolicy::Force)),
            ("opacityactive", TypedValue::Percentage(85), PolicyValue::Apply(ApplyPolicy::ForceTemporarily)),
            ("shortcut", TypedValue::Shortcut("Meta+E".into()), PolicyValue::Apply(ApplyPolicy::ApplyNow)),
        ];
        for (key, value, policy) in enable {
            record.set_enabled(key, true);
            record.set_value(key, value);
            record.set_policy(key, policy);
        }
        record.set_enabled("windowrole", true);
        record.set_value("windowrole", TypedValue::String("MainWindow#1".into()));
        record
    }

    #[test]
    fn test_encode_decode_roundtrip_for_enabled_fields() {
        let record = full_record();
        let group = encode(&record);
        let decoded = decode(&group);

        assert_eq!(decoded, record);
        assert_eq!(encode(&decoded), group);
    }

    #[test]
    fn test_encode_disabled_fields() {
        let group = encode(&RuleRecord::new());
        assert_eq!(group.get("titlePolicy"), Some(&Value::Integer(0)));
        assert!(group.get("title").is_none());
        assert_eq!(group.get("windowrole"), Some(&Value::String(String::new())));
        assert_eq!(group.get("positionPolicy"), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_encode_substitutes_default_description() {
        let mut record = RuleRecord::new();
        record.set_value("wmclass", TypedValue::String("vlc".into()));
        let group = encode(&record);
        assert_eq!(group.get("description").and_then(Value::as_str), Some("Settings for vlc"));
    }

    #[test]
    fn test_encode_keeps_catalog_order() {
        let group = encode(&full_record());
        let keys: Vec<_> = group.keys().take(4).map(String::as_str).collect();
        assert_eq!(keys, ["description", "wmclass", "wmclassPolicy", "wmclasscomplete"]);
    }

    #[test]
    fn test_decode_resets_missing_and_malformed_fields() {
        let group: RawGroup = toml::from_str(
            r#"
            description = "Broken"
            title = "Foo"
            position = "not a point"
            positionPolicy = 3
            size = "100,200"
            sizePolicy = 99
            above = true
            aboveUnused = 1
            fullscreen = true
            fullscreenPolicy = 0
            minimize = true
            minimizePolicy = 2
            "#,
        )
        .unwrap();

        let record = decode(&group);
        assert_eq!(record.description(), "Broken");
        // no titlePolicy
        assert!(!record.item("title").unwrap().is_enabled());
        assert!(!record.item("position").unwrap().is_enabled());
        assert!(!record.item("size").unwrap().is_enabled());
        assert!(!record.item("above").unwrap().is_enabled());
        assert!(!record.item("fullscreen").unwrap().is_enabled());

        let minimize = record.item("minimize").unwrap();
        assert!(minimize.is_enabled());
        assert_eq!(minimize.value(), &TypedValue::Boolean(true));
        assert_eq!(minimize.policy(), PolicyValue::Apply(ApplyPolicy::Force));
    }

    #[test]
    fn test_decode_empty_value_without_policy_is_disabled() {
        let group: RawGroup = toml::from_str(r#"windowrole = """#).unwrap();
        assert!(!decode(&group).item("windowrole").unwrap().is_enabled());
    }

    #[test]
    fn test_parse_import_entries() {
        let document: toml::Table = toml::from_str(
            r#"
            [first]
            description = "Terminal"
            wmclass = "konsole"
            wmclassPolicy = 1

            [second]
            description = "Old rule"
            deleteRule = true

            [third]
            wmclass = "nameless"
            wmclassPolicy = 1
            "#,
        )
        .unwrap();

        let entries = parse_import(&document);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "Terminal");
        assert!(!entries[0].delete);
        assert_eq!(entries[0].record.item("wmclass").unwrap().value(), &TypedValue::String("konsole".into()));
        assert_eq!(entries[1].description, "Old rule");
        assert!(entries[1].delete);
    }

    #[test]
    fn test_export_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let record = full_record();
        let path = export_path(dir.path(), record.description());
        assert_eq!(path.file_name().unwrap(), "Editor windows.winrule");

        write_export(&record, &path).unwrap();
        let entries = read_import(&path).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "Editor windows");
        assert_eq!(entries[0].record, record);
    }

    #[test]
    fn test_export_path_sanitizes_separators() {
        let path = export_path(Path::new("/tmp"), "a/b");
        assert_eq!(path, Path::new("/tmp/a_b.winrule"));
    }

    #[test]
    fn test_read_import_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_import(&dir.path().join("missing.winrule")).is_err());
    }
}
