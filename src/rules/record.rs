//! A complete named rule: one item per catalog field plus derived state

use crate::constants::{description, window_type};

use super::catalog::{FieldFlags, RuleFieldCatalog};
use super::item::RuleItem;
use super::value::{MatchPolicy, PolicyValue, TypedValue};

const WMCLASS_WARNING: &str = "You have specified the window class as unimportant.\n\
    This means the settings will possibly apply to windows from all applications. \
    If you really want to create a generic setting, it is recommended \
    you at least limit the window types to avoid special window types.";

/// Outcome of an accepted mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordChange {
    pub key: &'static str,
    pub description_changed: bool,
    pub warning_changed: bool,
}

/// Which items `visible_items` returns
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub search_text: String,
    pub show_all: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleRecord {
    items: Vec<RuleItem>,
    description: String,
    warning: bool,
}

impl Default for RuleRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRecord {
    /// Fresh record with every field at its catalog default
    pub fn new() -> Self {
        Self::from_items(RuleFieldCatalog::fields().iter().map(RuleItem::new).collect())
    }

    /// Items must be in catalog order, one per field
    pub(crate) fn from_items(items: Vec<RuleItem>) -> Self {
        debug_assert_eq!(items.len(), RuleFieldCatalog::len());
        let mut record = Self {
            items,
            description: String::new(),
            warning: false,
        };
        record.description = record.compute_description();
        record.warning = record.compute_warning();
        record
    }

    pub fn items(&self) -> &[RuleItem] {
        &self.items
    }

    pub fn item(&self, key: &str) -> Option<&RuleItem> {
        RuleFieldCatalog::index_of(key).map(|index| &self.items[index])
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn warning(&self) -> bool {
        self.warning
    }

    pub fn warning_message(&self) -> Option<&'static str> {
        self.warning.then_some(WMCLASS_WARNING)
    }

    pub fn set_enabled(&mut self, key: &str, enabled: bool) -> Option<RecordChange> {
        self.mutate(key, |item| item.set_enabled(enabled))
    }

    pub fn set_value(&mut self, key: &str, value: TypedValue) -> Option<RecordChange> {
        self.mutate(key, |item| item.set_value(value))
    }

    pub fn set_policy(&mut self, key: &str, policy: PolicyValue) -> Option<RecordChange> {
        self.mutate(key, |item| item.set_policy(policy))
    }

    pub fn reset_item(&mut self, key: &str) -> Option<RecordChange> {
        self.mutate(key, |item| {
            let before = item.clone();
            item.reset();
            *item != before
        })
    }

    /// Apply `f` to one item and recompute whatever its flags say depends on it
    fn mutate(&mut self, key: &str, f: impl FnOnce(&mut RuleItem) -> bool) -> Option<RecordChange> {
        let index = RuleFieldCatalog::index_of(key)?;
        let item = &mut self.items[index];
        if !f(item) {
            return None;
        }

        let spec = item.spec();
        let mut change = RecordChange {
            key: spec.key,
            description_changed: false,
            warning_changed: false,
        };

        if spec.has_flag(FieldFlags::AFFECTS_DESCRIPTION) {
            let description = self.compute_description();
            change.description_changed = description != self.description;
            self.description = description;
        }
        if spec.has_flag(FieldFlags::AFFECTS_WARNING) {
            let warning = self.compute_warning();
            change.warning_changed = warning != self.warning;
            self.warning = warning;
        }
        Some(change)
    }

    fn text_of(&self, key: &str) -> &str {
        self.item(key).and_then(|item| item.value().as_str()).unwrap_or("")
    }

    /// Description to use when none is set explicitly
    pub fn default_description(&self) -> String {
        let title_enabled = self.item("title").is_some_and(RuleItem::is_enabled);
        let title = if title_enabled { self.text_of("title") } else { "" };
        let wmclass = self.text_of("wmclass");

        if !title.is_empty() {
            format!("{}{title}", description::TITLE_PREFIX)
        } else if !wmclass.is_empty() {
            format!("{}{wmclass}", description::CLASS_PREFIX)
        } else {
            description::NEW_RULE.to_string()
        }
    }

    fn compute_description(&self) -> String {
        let explicit = self.text_of("description");
        if explicit.is_empty() {
            self.default_description()
        } else {
            explicit.to_string()
        }
    }

    /// A rule matching any application and any ordinary window type
    fn compute_warning(&self) -> bool {
        let no_wmclass = self.item("wmclass").is_none_or(|item| {
            !item.is_enabled() || item.policy() == PolicyValue::Match(MatchPolicy::Unimportant)
        });

        let all_types = self.item("types").is_none_or(|item| {
            if !item.is_enabled() {
                return true;
            }
            match item.value() {
                TypedValue::FlagsOption(mask) => {
                    *mask == 0
                        || *mask == window_type::ALL_TYPES_MASK
                        || (*mask | (1 << window_type::OVERRIDE)) == window_type::CLASSIC_TYPES_MASK
                }
                _ => true,
            }
        });

        no_wmclass && all_types
    }

    /// Items to present for the given search text / show-all setting
    pub fn visible_items(&self, filter: &ItemFilter) -> Vec<&RuleItem> {
        let needle = filter.search_text.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| {
                if needle.is_empty() {
                    filter.show_all || item.is_enabled()
                } else {
                    item.key().contains(&needle) || item.spec().name.to_lowercase().contains(&needle)
                }
            })
            .collect()
    }
}
