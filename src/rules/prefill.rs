//! Merge a detected window-property snapshot into a rule's unset fields

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::constants::window_type;

use super::catalog::{RuleFieldCatalog, Section};
use super::record::RuleRecord;
use super::value::{MatchPolicy, PolicyKind, PolicyValue, TypedValue};

/// Flat key → value property snapshot of one window
pub type PropertyBag = Map<String, JsonValue>;

/// Snapshot attributes that map one-to-one onto a rule field
const PROPERTY_TO_RULE: &[(&str, &str)] = &[
    ("caption", "title"),
    ("role", "windowrole"),
    ("clientMachine", "clientmachine"),
    ("x11DesktopNumber", "desktop"),
    ("maximizeHorizontal", "maximizehoriz"),
    ("maximizeVertical", "maximizevert"),
    ("minimized", "minimize"),
    ("shaded", "shade"),
    ("fullscreen", "fullscreen"),
    ("keepAbove", "above"),
    ("keepBelow", "below"),
    ("noBorder", "noborder"),
    ("skipTaskbar", "skiptaskbar"),
    ("skipPager", "skippager"),
    ("skipSwitcher", "skipswitcher"),
    ("type", "type"),
    ("desktopFile", "desktopfile"),
];

/// Fill every unset field of `record` that the snapshot has a value for.
///
/// Fields already enabled with a value are never touched. Matching fields are
/// enabled when written, and an Unimportant string match becomes Exact so the
/// field is kept when the rule is stored. Other fields only receive the
/// suggested value. Returns the keys that changed.
pub fn prefill(record: &mut RuleRecord, bag: &PropertyBag) -> Vec<&'static str> {
    let mut changed = Vec::new();

    let int = |key: &str| bag.get(key).and_then(JsonValue::as_i64).unwrap_or(0);
    let position = format!("{},{}", int("x"), int("y"));
    let size = format!("{},{}", int("width"), int("height"));

    if bag.contains_key("x") || bag.contains_key("y") {
        write_unset(record, "position", TypedValue::String(position), &mut changed);
    }
    if bag.contains_key("width") || bag.contains_key("height") {
        for key in ["size", "minsize", "maxsize"] {
            write_unset(record, key, TypedValue::String(size.clone()), &mut changed);
        }
    }

    let types_unset = record.item("types").is_none_or(|item| {
        !item.is_enabled() || *item.value() == TypedValue::FlagsOption(0)
    });
    if types_unset {
        let detected = bag
            .get("type")
            .and_then(JsonValue::as_i64)
            .filter(|t| (0..32).contains(t))
            .unwrap_or(window_type::NORMAL);
        // Unknown (-1) and anything out of range fall back to Normal
        let mask = TypedValue::FlagsOption(1 << detected);
        if record.set_value("types", mask).is_some() {
            changed.push("types");
        }
    }

    if let Some(wmclass) = detected_wmclass(record, bag) {
        write_unset(record, "wmclass", TypedValue::String(wmclass), &mut changed);
    }

    for (property, key) in PROPERTY_TO_RULE {
        let Some(value) = bag.get(*property).and_then(TypedValue::from_json) else {
            continue;
        };
        write_unset(record, key, value, &mut changed);
    }

    debug!(changed = ?changed, "Prefilled rule from window properties");
    changed
}

/// `resourceClass`, or `"resourceName resourceClass"` when matching the whole class
fn detected_wmclass(record: &RuleRecord, bag: &PropertyBag) -> Option<String> {
    let text = |key: &str| bag.get(key).and_then(JsonValue::as_str).filter(|s| !s.is_empty());
    let complete = record
        .item("wmclasscomplete")
        .is_some_and(|item| *item.value() == TypedValue::Boolean(true));

    match (text("resourceName"), text("resourceClass")) {
        (Some(name), Some(class)) if complete => Some(format!("{name} {class}")),
        (_, Some(class)) => Some(class.to_string()),
        (Some(name), None) => Some(name.to_string()),
        (None, None) => None,
    }
}

fn write_unset(record: &mut RuleRecord, key: &'static str, value: TypedValue, changed: &mut Vec<&'static str>) {
    let Some(item) = record.item(key) else {
        return;
    };
    if !item.is_unset() {
        return;
    }

    let mut touched = record.set_value(key, value).is_some();
    let matching = RuleFieldCatalog::get(key).filter(|spec| spec.section == Section::WindowMatching);
    if let Some(spec) = matching {
        touched |= record.set_enabled(key, true).is_some();

        // Unimportant is stored as the unused marker and would drop the field
        let unimportant = record
            .item(key)
            .is_some_and(|item| item.policy() == PolicyValue::Match(MatchPolicy::Unimportant));
        if spec.policy == PolicyKind::StringMatch && unimportant {
            touched |= record.set_policy(key, PolicyValue::Match(MatchPolicy::Exact)).is_some();
        }
    }
    if touched {
        changed.push(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: JsonValue) -> PropertyBag {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_prefill_enables_disabled_title() {
        let mut record = RuleRecord::new();
        let changed = prefill(&mut record, &bag(json!({ "caption": "Foo" })));

        let title = record.item("title").unwrap();
        assert!(title.is_enabled());
        assert_eq!(title.value(), &TypedValue::String("Foo".into()));
        assert!(changed.contains(&"title"));
        assert_eq!(record.description(), "Window settings for Foo");
    }

    #[test]
    fn test_prefill_string_matches_become_exact() {
        let mut record = RuleRecord::new();
        prefill(
            &mut record,
            &bag(json!({ "caption": "Foo", "resourceClass": "firefox", "clientMachine": "host", "role": "browser" })),
        );

        let exact = PolicyValue::Match(MatchPolicy::Exact);
        for key in ["title", "wmclass", "clientmachine"] {
            let item = record.item(key).unwrap();
            assert!(item.is_enabled(), "{key} enabled");
            assert_eq!(item.policy(), exact, "{key} policy");
        }
        // no match policy to upgrade
        let role = record.item("windowrole").unwrap();
        assert!(role.is_enabled());
        assert_eq!(role.policy(), PolicyValue::None);
    }

    #[test]
    fn test_prefill_keeps_chosen_match_policy() {
        let mut record = RuleRecord::new();
        record.set_policy("title", PolicyValue::Match(MatchPolicy::Substring));
        prefill(&mut record, &bag(json!({ "caption": "Foo" })));
        assert_eq!(record.item("title").unwrap().policy(), PolicyValue::Match(MatchPolicy::Substring));
    }

    #[test]
    fn test_prefill_never_overwrites_active_value() {
        let mut record = RuleRecord::new();
        record.set_enabled("title", true);
        record.set_value("title", TypedValue::String("Bar".into()));

        let changed = prefill(&mut record, &bag(json!({ "caption": "Foo" })));
        assert_eq!(record.item("title").unwrap().value(), &TypedValue::String("Bar".into()));
        assert!(!changed.contains(&"title"));
    }

    #[test]
    fn test_prefill_geometry_pairs() {
        let mut record = RuleRecord::new();
        record.set_enabled("maxsize", true);
        record.set_value("maxsize", TypedValue::Coordinate(1, 1));

        prefill(&mut record, &bag(json!({ "x": 10, "y": 20, "width": 640, "height": 480 })));

        assert_eq!(record.item("position").unwrap().value(), &TypedValue::Coordinate(10, 20));
        assert_eq!(record.item("size").unwrap().value(), &TypedValue::Coordinate(640, 480));
        assert_eq!(record.item("minsize").unwrap().value(), &TypedValue::Coordinate(640, 480));
        // enabled coordinates are active rules
        assert_eq!(record.item("maxsize").unwrap().value(), &TypedValue::Coordinate(1, 1));
        // suggested only
        assert!(!record.item("position").unwrap().is_enabled());
    }

    #[test]
    fn test_prefill_window_type_seeding() {
        let mut record = RuleRecord::new();
        prefill(&mut record, &bag(json!({ "type": window_type::DIALOG })));
        assert_eq!(record.item("types").unwrap().value(), &TypedValue::FlagsOption(1 << 5));

        let mut unknown = RuleRecord::new();
        prefill(&mut unknown, &bag(json!({ "type": window_type::UNKNOWN })));
        assert_eq!(unknown.item("types").unwrap().value(), &TypedValue::FlagsOption(1));

        let mut preset = RuleRecord::new();
        preset.set_value("types", TypedValue::FlagsOption(1 << 8));
        prefill(&mut preset, &bag(json!({ "type": window_type::DIALOG })));
        assert_eq!(preset.item("types").unwrap().value(), &TypedValue::FlagsOption(1 << 8));
    }

    #[test]
    fn test_prefill_wmclass_and_warning() {
        let mut record = RuleRecord::new();
        assert!(record.warning());

        prefill(&mut record, &bag(json!({ "resourceName": "navigator", "resourceClass": "firefox", "type": 0 })));
        assert_eq!(record.item("wmclass").unwrap().value(), &TypedValue::String("firefox".into()));
        assert_eq!(record.description(), "Settings for firefox");
        assert_eq!(record.item("types").unwrap().value(), &TypedValue::FlagsOption(1));
        assert!(!record.warning());

        let mut complete = RuleRecord::new();
        complete.set_value("wmclasscomplete", TypedValue::Boolean(true));
        prefill(&mut complete, &bag(json!({ "resourceName": "navigator", "resourceClass": "firefox" })));
        assert_eq!(complete.item("wmclass").unwrap().value(), &TypedValue::String("navigator firefox".into()));
    }

    #[test]
    fn test_prefill_ignores_unmapped_and_mistyped_properties() {
        let mut record = RuleRecord::new();
        let changed = prefill(&mut record, &bag(json!({ "unrelated": 1, "keepAbove": [true] })));
        assert_eq!(changed, ["types"]);
        assert!(record.item("above").unwrap().value() == &TypedValue::Boolean(false));
    }
}
