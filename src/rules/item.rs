use tracing::debug;

use super::catalog::{FieldFlags, FieldSpec};
use super::value::{PolicyKind, PolicyValue, TypedValue, ValueKind};

/// Live state of one catalog field inside a rule record
#[derive(Debug, Clone, PartialEq)]
pub struct RuleItem {
    spec: &'static FieldSpec,
    enabled: bool,
    value: TypedValue,
    policy: PolicyValue,
}

impl RuleItem {
    pub fn new(spec: &'static FieldSpec) -> Self {
        Self {
            spec,
            enabled: spec.has_flag(FieldFlags::ALWAYS_ENABLED) || spec.has_flag(FieldFlags::START_ENABLED),
            value: spec.kind.zero(),
            policy: spec.policy.default_policy(),
        }
    }

    pub fn spec(&self) -> &'static FieldSpec {
        self.spec
    }

    pub fn key(&self) -> &'static str {
        self.spec.key
    }

    pub fn kind(&self) -> ValueKind {
        self.spec.kind
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.spec.policy
    }

    pub fn has_flag(&self, flag: FieldFlags) -> bool {
        self.spec.has_flag(flag)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn value(&self) -> &TypedValue {
        &self.value
    }

    pub fn policy(&self) -> PolicyValue {
        self.policy
    }

    /// Value as seen by window matching: disabled items have none
    pub fn effective_value(&self) -> Option<&TypedValue> {
        self.enabled.then_some(&self.value)
    }

    /// Disabled, or holding an empty value
    pub fn is_unset(&self) -> bool {
        !self.enabled || self.value.is_empty()
    }

    /// Returns `true` if the enabled state changed
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        if !enabled && self.has_flag(FieldFlags::ALWAYS_ENABLED) {
            debug!(key = self.key(), "Ignoring attempt to disable an always-enabled field");
            return false;
        }
        if self.enabled == enabled {
            return false;
        }
        self.enabled = enabled;
        true
    }

    /// Coerce and store `value`. Returns `true` only if the stored value changed.
    pub fn set_value(&mut self, value: TypedValue) -> bool {
        let given = value.kind();
        let Some(value) = value.coerce(self.spec.kind) else {
            debug!(key = self.key(), expected = self.spec.kind.name(), given = given.name(), "Rejected incompatible value");
            return false;
        };
        if value == self.value {
            return false;
        }
        self.value = value;
        true
    }

    /// Returns `true` if the policy changed; policies outside the field's set are rejected
    pub fn set_policy(&mut self, policy: PolicyValue) -> bool {
        if !self.spec.policy.accepts(policy) {
            debug!(key = self.key(), policy = %policy, "Rejected policy not valid for field");
            return false;
        }
        if policy == self.policy {
            return false;
        }
        self.policy = policy;
        true
    }

    /// Clear value and policy; only always-enabled fields stay enabled
    pub fn reset(&mut self) {
        self.value = self.spec.kind.zero();
        self.policy = self.spec.policy.default_policy();
        self.enabled = self.has_flag(FieldFlags::ALWAYS_ENABLED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::catalog::{RuleFieldCatalog, Section};
    use crate::rules::value::{ApplyPolicy, MatchPolicy};

    fn item(key: &str) -> RuleItem {
        RuleItem::new(RuleFieldCatalog::get(key).unwrap())
    }

    static START_ENABLED_SPEC: FieldSpec = FieldSpec {
        key: "probe",
        name: "Probe",
        section: Section::WindowMatching,
        kind: ValueKind::Boolean,
        policy: PolicyKind::None,
        flags: FieldFlags::START_ENABLED,
        help: None,
        options: &[],
    };

    #[test]
    fn test_new_item_enabled_state() {
        assert!(item("wmclass").is_enabled());
        assert!(!item("title").is_enabled());
        assert!(RuleItem::new(&START_ENABLED_SPEC).is_enabled());
    }

    #[test]
    fn test_set_value_reports_change_only_when_different() {
        let mut title = item("title");
        assert!(title.set_value(TypedValue::String("Foo".into())));
        assert!(!title.set_value(TypedValue::String("Foo".into())));
        assert_eq!(title.value(), &TypedValue::String("Foo".into()));
    }

    #[test]
    fn test_set_value_rejects_incompatible_kind() {
        let mut position = item("position");
        assert!(!position.set_value(TypedValue::Boolean(true)));
        assert_eq!(position.value(), &TypedValue::Coordinate(0, 0));

        assert!(position.set_value(TypedValue::String("100, 200".into())));
        assert_eq!(position.value(), &TypedValue::Coordinate(100, 200));
    }

    #[test]
    fn test_set_policy_outside_kind_is_noop() {
        let mut placement = item("placement");
        assert!(!placement.set_policy(PolicyValue::Apply(ApplyPolicy::Remember)));
        assert!(!placement.set_policy(PolicyValue::Match(MatchPolicy::Exact)));
        assert_eq!(placement.policy(), PolicyValue::Apply(ApplyPolicy::DontAffect));
        assert!(placement.set_policy(PolicyValue::Apply(ApplyPolicy::Force)));

        let mut role = item("windowrole");
        assert!(!role.set_policy(PolicyValue::Match(MatchPolicy::Exact)));
        assert_eq!(role.policy(), PolicyValue::None);
    }

    #[test]
    fn test_disable_keeps_value_but_hides_it() {
        let mut title = item("title");
        title.set_enabled(true);
        title.set_value(TypedValue::String("Foo".into()));
        assert_eq!(title.effective_value(), Some(&TypedValue::String("Foo".into())));

        assert!(title.set_enabled(false));
        assert_eq!(title.effective_value(), None);
        assert_eq!(title.value(), &TypedValue::String("Foo".into()));
    }

    #[test]
    fn test_always_enabled_cannot_be_disabled() {
        let mut wmclass = item("wmclass");
        assert!(!wmclass.set_enabled(false));
        assert!(wmclass.is_enabled());
    }

    #[test]
    fn test_reset() {
        let mut title = item("title");
        title.set_enabled(true);
        title.set_value(TypedValue::String("Foo".into()));
        title.set_policy(PolicyValue::Match(MatchPolicy::Exact));
        title.reset();
        assert!(!title.is_enabled());
        assert_eq!(title.value(), &TypedValue::String(String::new()));
        assert_eq!(title.policy(), PolicyValue::Match(MatchPolicy::Unimportant));

        let mut wmclass = item("wmclass");
        wmclass.set_value(TypedValue::String("firefox".into()));
        wmclass.reset();
        assert!(wmclass.is_enabled());
        assert!(wmclass.value().is_empty());
    }
}
