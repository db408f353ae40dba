//! Typed rule values and rule policies
//!
//! Every catalog field declares a [`ValueKind`]; values travel as the closed
//! [`TypedValue`] union and are coerced against the declared kind before they
//! are stored. Policies are grouped by [`PolicyKind`] and persisted as the
//! integers the compositor understands.

use std::fmt;

use serde_json::Value as JsonValue;

use crate::constants::validation::MAX_PERCENTAGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Boolean,
    Integer,
    Percentage,
    Coordinate,
    Option,
    FlagsOption,
    Shortcut,
}

impl ValueKind {
    /// Empty value of this kind, used by `reset()`
    pub fn zero(self) -> TypedValue {
        match self {
            ValueKind::String => TypedValue::String(String::new()),
            ValueKind::Boolean => TypedValue::Boolean(false),
            ValueKind::Integer => TypedValue::Integer(0),
            ValueKind::Percentage => TypedValue::Percentage(0),
            ValueKind::Coordinate => TypedValue::Coordinate(0, 0),
            ValueKind::Option => TypedValue::Option(String::new()),
            ValueKind::FlagsOption => TypedValue::FlagsOption(0),
            ValueKind::Shortcut => TypedValue::Shortcut(String::new()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Percentage => "percentage",
            ValueKind::Coordinate => "coordinate",
            ValueKind::Option => "option",
            ValueKind::FlagsOption => "flags",
            ValueKind::Shortcut => "shortcut",
        }
    }
}

/// A rule value tagged with its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    /// 0..=100
    Percentage(u8),
    /// Position or size pair
    Coordinate(i32, i32),
    Option(String),
    /// Bitmask of option indices
    FlagsOption(u32),
    Shortcut(String),
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::String(_) => ValueKind::String,
            TypedValue::Boolean(_) => ValueKind::Boolean,
            TypedValue::Integer(_) => ValueKind::Integer,
            TypedValue::Percentage(_) => ValueKind::Percentage,
            TypedValue::Coordinate(_, _) => ValueKind::Coordinate,
            TypedValue::Option(_) => ValueKind::Option,
            TypedValue::FlagsOption(_) => ValueKind::FlagsOption,
            TypedValue::Shortcut(_) => ValueKind::Shortcut,
        }
    }

    /// Only textual values can be empty
    pub fn is_empty(&self) -> bool {
        match self {
            TypedValue::String(s) | TypedValue::Option(s) | TypedValue::Shortcut(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) | TypedValue::Option(s) | TypedValue::Shortcut(s) => Some(s),
            _ => None,
        }
    }

    /// Convert this value into `kind`, or `None` when the two are incompatible
    pub fn coerce(self, kind: ValueKind) -> Option<TypedValue> {
        use TypedValue as V;

        match (kind, self) {
            (ValueKind::String, V::String(s) | V::Option(s) | V::Shortcut(s)) => Some(V::String(s)),
            (ValueKind::String, other @ (V::Integer(_) | V::Boolean(_) | V::Percentage(_) | V::FlagsOption(_) | V::Coordinate(_, _))) => {
                Some(V::String(other.to_string()))
            }

            (ValueKind::Boolean, V::Boolean(b)) => Some(V::Boolean(b)),
            (ValueKind::Boolean, V::Integer(n)) => Some(V::Boolean(n != 0)),
            (ValueKind::Boolean, V::String(s)) => parse_bool(&s).map(V::Boolean),

            (ValueKind::Integer, V::Integer(n)) => Some(V::Integer(n)),
            (ValueKind::Integer, V::Percentage(p)) => Some(V::Integer(p as i64)),
            (ValueKind::Integer, V::FlagsOption(n)) => Some(V::Integer(n as i64)),
            (ValueKind::Integer, V::String(s) | V::Option(s)) => parse_int(&s).map(V::Integer),

            (ValueKind::Percentage, V::Percentage(p)) => Some(V::Percentage(p.min(MAX_PERCENTAGE))),
            (ValueKind::Percentage, V::Integer(n)) => Some(V::Percentage(clamp_percentage(n))),
            (ValueKind::Percentage, V::String(s)) => {
                let trimmed = s.trim().trim_end_matches('%');
                parse_int(trimmed).map(|n| V::Percentage(clamp_percentage(n)))
            }

            (ValueKind::Coordinate, V::Coordinate(x, y)) => Some(V::Coordinate(x, y)),
            (ValueKind::Coordinate, V::String(s)) => parse_coordinate(&s).map(|(x, y)| V::Coordinate(x, y)),

            (ValueKind::Option, V::Option(s) | V::String(s)) => Some(V::Option(s)),
            (ValueKind::Option, V::Integer(n)) => Some(V::Option(n.to_string())),

            (ValueKind::FlagsOption, V::FlagsOption(n)) => Some(V::FlagsOption(n)),
            (ValueKind::FlagsOption, V::Integer(n)) => u32::try_from(n).ok().map(V::FlagsOption),
            (ValueKind::FlagsOption, V::String(s)) => parse_int(&s)
                .and_then(|n| u32::try_from(n).ok())
                .map(V::FlagsOption),

            (ValueKind::Shortcut, V::Shortcut(s) | V::String(s)) => Some(V::Shortcut(s)),

            _ => None,
        }
    }

    /// Lift a property-bag value into the closest typed value
    pub fn from_json(value: &JsonValue) -> Option<TypedValue> {
        match value {
            JsonValue::Bool(b) => Some(TypedValue::Boolean(*b)),
            JsonValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .map(TypedValue::Integer),
            JsonValue::String(s) => Some(TypedValue::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) | TypedValue::Option(s) | TypedValue::Shortcut(s) => f.write_str(s),
            TypedValue::Boolean(b) => write!(f, "{b}"),
            TypedValue::Integer(n) => write!(f, "{n}"),
            TypedValue::Percentage(p) => write!(f, "{p}"),
            TypedValue::Coordinate(x, y) => write!(f, "{x},{y}"),
            TypedValue::FlagsOption(n) => write!(f, "{n}"),
        }
    }
}

fn clamp_percentage(n: i64) -> u8 {
    n.clamp(0, MAX_PERCENTAGE as i64) as u8
}

/// Accepts decimal and `0x` hex
fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Parse `"X,Y"`, `"WxH"` or `"X Y"` into a pair
fn parse_coordinate(s: &str) -> Option<(i32, i32)> {
    let parts: Vec<&str> = s
        .split(|c: char| c == ',' || c == 'x' || c == 'X' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();

    match parts.as_slice() {
        [x, y] => Some((x.parse().ok()?, y.parse().ok()?)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    None,
    StringMatch,
    SetPolicy,
    ForcePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchPolicy {
    Unimportant,
    Exact,
    Substring,
    RegExp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyPolicy {
    DontAffect,
    Force,
    Apply,
    Remember,
    ApplyNow,
    ForceTemporarily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyValue {
    None,
    Match(MatchPolicy),
    Apply(ApplyPolicy),
}

const NO_POLICY: &[PolicyValue] = &[PolicyValue::None];

const MATCH_POLICIES: &[PolicyValue] = &[
    PolicyValue::Match(MatchPolicy::Unimportant),
    PolicyValue::Match(MatchPolicy::Exact),
    PolicyValue::Match(MatchPolicy::Substring),
    PolicyValue::Match(MatchPolicy::RegExp),
];

const SET_POLICIES: &[PolicyValue] = &[
    PolicyValue::Apply(ApplyPolicy::DontAffect),
    PolicyValue::Apply(ApplyPolicy::Apply),
    PolicyValue::Apply(ApplyPolicy::Remember),
    PolicyValue::Apply(ApplyPolicy::Force),
    PolicyValue::Apply(ApplyPolicy::ApplyNow),
    PolicyValue::Apply(ApplyPolicy::ForceTemporarily),
];

const FORCE_POLICIES: &[PolicyValue] = &[
    PolicyValue::Apply(ApplyPolicy::DontAffect),
    PolicyValue::Apply(ApplyPolicy::Force),
    PolicyValue::Apply(ApplyPolicy::ForceTemporarily),
];

impl PolicyKind {
    pub fn has_policy(self) -> bool {
        self != PolicyKind::None
    }

    /// Valid policies for this kind, in presentation order
    pub fn options(self) -> &'static [PolicyValue] {
        match self {
            PolicyKind::None => NO_POLICY,
            PolicyKind::StringMatch => MATCH_POLICIES,
            PolicyKind::SetPolicy => SET_POLICIES,
            PolicyKind::ForcePolicy => FORCE_POLICIES,
        }
    }

    pub fn default_policy(self) -> PolicyValue {
        self.options()[0]
    }

    pub fn accepts(self, policy: PolicyValue) -> bool {
        self.options().contains(&policy)
    }

    /// Decode a persisted policy integer
    pub fn from_raw(self, raw: i64) -> Option<PolicyValue> {
        if !self.has_policy() {
            return None;
        }
        self.options().iter().copied().find(|p| p.to_raw() == raw)
    }

    /// Parse a policy given as its integer or its label
    pub fn parse(self, text: &str) -> Option<PolicyValue> {
        let text = text.trim();
        if let Ok(raw) = text.parse::<i64>() {
            return self.from_raw(raw);
        }
        self.options()
            .iter()
            .copied()
            .find(|p| p.label().eq_ignore_ascii_case(text))
    }
}

impl PolicyValue {
    pub fn to_raw(self) -> i64 {
        match self {
            PolicyValue::None => 0,
            PolicyValue::Match(MatchPolicy::Unimportant) => 0,
            PolicyValue::Match(MatchPolicy::Exact) => 1,
            PolicyValue::Match(MatchPolicy::Substring) => 2,
            PolicyValue::Match(MatchPolicy::RegExp) => 3,
            PolicyValue::Apply(ApplyPolicy::DontAffect) => 1,
            PolicyValue::Apply(ApplyPolicy::Force) => 2,
            PolicyValue::Apply(ApplyPolicy::Apply) => 3,
            PolicyValue::Apply(ApplyPolicy::Remember) => 4,
            PolicyValue::Apply(ApplyPolicy::ApplyNow) => 5,
            PolicyValue::Apply(ApplyPolicy::ForceTemporarily) => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PolicyValue::None => "none",
            PolicyValue::Match(MatchPolicy::Unimportant) => "unimportant",
            PolicyValue::Match(MatchPolicy::Exact) => "exact",
            PolicyValue::Match(MatchPolicy::Substring) => "substring",
            PolicyValue::Match(MatchPolicy::RegExp) => "regexp",
            PolicyValue::Apply(ApplyPolicy::DontAffect) => "dont-affect",
            PolicyValue::Apply(ApplyPolicy::Force) => "force",
            PolicyValue::Apply(ApplyPolicy::Apply) => "apply",
            PolicyValue::Apply(ApplyPolicy::Remember) => "remember",
            PolicyValue::Apply(ApplyPolicy::ApplyNow) => "apply-now",
            PolicyValue::Apply(ApplyPolicy::ForceTemporarily) => "force-temporarily",
        }
    }
}

impl fmt::Display for PolicyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
