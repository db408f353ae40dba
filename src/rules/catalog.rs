//! Fixed catalog of window rule fields
//!
//! The catalog is a static table: one [`FieldSpec`] per rule field, in the
//! order records store and present them. It is never mutated at runtime.

use std::collections::HashMap;
use std::ops::BitOr;
use std::sync::LazyLock;

use super::value::{PolicyKind, ValueKind};

/// Behaviour flags attached to a catalog field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldFlags(u8);

impl FieldFlags {
    pub const NONE: Self = Self(0);
    /// The field cannot be disabled
    pub const ALWAYS_ENABLED: Self = Self(1 << 0);
    /// The field is enabled on a fresh record
    pub const START_ENABLED: Self = Self(1 << 1);
    /// Changes to the field recompute the record warning
    pub const AFFECTS_WARNING: Self = Self(1 << 2);
    /// Changes to the field recompute the record description
    pub const AFFECTS_DESCRIPTION: Self = Self(1 << 3);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FieldFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Display grouping of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    WindowMatching,
    SizeAndPosition,
    ArrangementAndAccess,
    AppearanceAndFixes,
}

impl Section {
    pub fn label(self) -> &'static str {
        match self {
            Section::WindowMatching => "Window matching",
            Section::SizeAndPosition => "Size & Position",
            Section::ArrangementAndAccess => "Arrangement & Access",
            Section::AppearanceAndFixes => "Appearance & Fixes",
        }
    }
}

/// One selectable value of an Option or FlagsOption field
///
/// For FlagsOption fields `value` is the bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionData {
    pub value: &'static str,
    pub label: &'static str,
}

const fn opt(value: &'static str, label: &'static str) -> OptionData {
    OptionData { value, label }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub section: Section,
    pub kind: ValueKind,
    pub policy: PolicyKind,
    pub flags: FieldFlags,
    pub help: Option<&'static str>,
    pub options: &'static [OptionData],
}

impl FieldSpec {
    const fn new(
        key: &'static str,
        policy: PolicyKind,
        kind: ValueKind,
        name: &'static str,
        section: Section,
    ) -> Self {
        Self {
            key,
            name,
            section,
            kind,
            policy,
            flags: FieldFlags::NONE,
            help: None,
            options: &[],
        }
    }

    const fn flags(self, flags: FieldFlags) -> Self {
        Self { flags, ..self }
    }

    const fn help(self, help: &'static str) -> Self {
        Self { help: Some(help), ..self }
    }

    const fn options(self, options: &'static [OptionData]) -> Self {
        Self { options, ..self }
    }

    pub fn has_flag(&self, flag: FieldFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Key of the companion policy entry, if the field carries a policy
    pub fn policy_key(&self) -> Option<String> {
        self.policy
            .has_policy()
            .then(|| format!("{}{}", self.key, crate::constants::rulebook::POLICY_SUFFIX))
    }
}

pub const WINDOW_TYPES: &[OptionData] = &[
    opt("0", "Normal Window"),
    opt("5", "Dialog Window"),
    opt("8", "Utility Window"),
    opt("2", "Dock (panel)"),
    opt("3", "Toolbar"),
    opt("4", "Torn-Off Menu"),
    opt("9", "Splash Screen"),
    opt("1", "Desktop"),
    opt("7", "Standalone Menubar"),
];

pub const VIRTUAL_DESKTOPS: &[OptionData] = &[
    opt("1", "Desktop 1"),
    opt("2", "Desktop 2"),
    opt("3", "Desktop 3"),
    opt("4", "Desktop 4"),
    opt("-1", "All Desktops"),
];

pub const ACTIVITIES: &[OptionData] = &[opt("00000000-0000-0000-0000-000000000000", "All Activities")];

pub const PLACEMENTS: &[OptionData] = &[
    opt("Default", "Default"),
    opt("NoPlacement", "No Placement"),
    opt("Smart", "Minimal Overlapping"),
    opt("Maximizing", "Maximized"),
    opt("Cascade", "Cascaded"),
    opt("Centered", "Centered"),
    opt("Random", "Random"),
    opt("ZeroCornered", "In Top-Left Corner"),
    opt("UnderMouse", "Under Mouse"),
    opt("OnMainWindow", "On Main Window"),
];

pub const FOCUS_LEVELS: &[OptionData] = &[
    opt("0", "None"),
    opt("1", "Low"),
    opt("2", "Normal"),
    opt("3", "High"),
    opt("4", "Extreme"),
];

use FieldFlags as F;
use PolicyKind as P;
use Section as S;
use ValueKind as K;

static FIELDS: &[FieldSpec] = &[
    FieldSpec::new("description", P::None, K::String, "Description", S::WindowMatching)
        .flags(F::ALWAYS_ENABLED.union(F::AFFECTS_DESCRIPTION)),
    FieldSpec::new("wmclass", P::StringMatch, K::String, "Window class (application)", S::WindowMatching)
        .flags(F::ALWAYS_ENABLED.union(F::AFFECTS_WARNING).union(F::AFFECTS_DESCRIPTION)),
    FieldSpec::new("wmclasscomplete", P::None, K::Boolean, "Match whole window class", S::WindowMatching)
        .flags(F::ALWAYS_ENABLED),
    FieldSpec::new("types", P::None, K::FlagsOption, "Window types", S::WindowMatching)
        .flags(F::ALWAYS_ENABLED.union(F::AFFECTS_WARNING))
        .options(WINDOW_TYPES),
    FieldSpec::new("windowrole", P::None, K::String, "Window role", S::WindowMatching),
    FieldSpec::new("title", P::StringMatch, K::String, "Window title", S::WindowMatching)
        .flags(F::AFFECTS_DESCRIPTION),
    FieldSpec::new("clientmachine", P::StringMatch, K::String, "Machine (hostname)", S::WindowMatching),
    // Size & Position
    FieldSpec::new("position", P::SetPolicy, K::Coordinate, "Position", S::SizeAndPosition),
    FieldSpec::new("size", P::SetPolicy, K::Coordinate, "Size", S::SizeAndPosition),
    FieldSpec::new("maximizehoriz", P::SetPolicy, K::Boolean, "Maximized horizontally", S::SizeAndPosition),
    FieldSpec::new("maximizevert", P::SetPolicy, K::Boolean, "Maximized vertically", S::SizeAndPosition),
    FieldSpec::new("desktop", P::SetPolicy, K::Option, "Virtual Desktop", S::SizeAndPosition)
        .options(VIRTUAL_DESKTOPS),
    FieldSpec::new("activity", P::SetPolicy, K::Option, "Activity", S::SizeAndPosition)
        .options(ACTIVITIES),
    FieldSpec::new("screen", P::SetPolicy, K::Integer, "Screen", S::SizeAndPosition),
    FieldSpec::new("fullscreen", P::SetPolicy, K::Boolean, "Fullscreen", S::SizeAndPosition),
    FieldSpec::new("minimize", P::SetPolicy, K::Boolean, "Minimized", S::SizeAndPosition),
    FieldSpec::new("shade", P::SetPolicy, K::Boolean, "Shaded", S::SizeAndPosition),
    FieldSpec::new("placement", P::ForcePolicy, K::Option, "Initial placement", S::SizeAndPosition)
        .options(PLACEMENTS),
    FieldSpec::new("ignoregeometry", P::SetPolicy, K::Boolean, "Ignore requested geometry", S::SizeAndPosition)
        .help(
            "Windows can ask to appear in a certain position.\n\
             By default this overrides the placement strategy\n\
             what might be nasty if the client abuses the feature\n\
             to unconditionally popup in the middle of your screen.",
        ),
    FieldSpec::new("minsize", P::ForcePolicy, K::Coordinate, "Minimum Size", S::SizeAndPosition),
    FieldSpec::new("maxsize", P::ForcePolicy, K::Coordinate, "Maximum Size", S::SizeAndPosition),
    FieldSpec::new("strictgeometry", P::ForcePolicy, K::Boolean, "Obey geometry restrictions", S::SizeAndPosition)
        .help(
            "Eg. terminals or video players can ask to keep a certain aspect ratio\n\
             or only grow by values larger than one.\n\
             The restriction prevents arbitrary dimensions like your complete screen area.",
        ),
    // Arrangement & Access
    FieldSpec::new("above", P::SetPolicy, K::Boolean, "Keep above", S::ArrangementAndAccess),
    FieldSpec::new("below", P::SetPolicy, K::Boolean, "Keep below", S::ArrangementAndAccess),
    FieldSpec::new("skiptaskbar", P::SetPolicy, K::Boolean, "Skip taskbar", S::ArrangementAndAccess)
        .help("Window shall (not) appear in the taskbar."),
    FieldSpec::new("skippager", P::SetPolicy, K::Boolean, "Skip pager", S::ArrangementAndAccess)
        .help("Window shall (not) appear in the manager for virtual desktops"),
    FieldSpec::new("skipswitcher", P::SetPolicy, K::Boolean, "Skip switcher", S::ArrangementAndAccess)
        .help("Window shall (not) appear in the Alt+Tab list"),
    FieldSpec::new("shortcut", P::SetPolicy, K::Shortcut, "Shortcut", S::ArrangementAndAccess),
    // Appearance & Fixes
    FieldSpec::new("noborder", P::SetPolicy, K::Boolean, "No titlebar and frame", S::AppearanceAndFixes),
    FieldSpec::new("decocolor", P::ForcePolicy, K::Option, "Titlebar color scheme", S::AppearanceAndFixes),
    FieldSpec::new("opacityactive", P::ForcePolicy, K::Percentage, "Active opacity", S::AppearanceAndFixes),
    FieldSpec::new("opacityinactive", P::ForcePolicy, K::Percentage, "Inactive opacity", S::AppearanceAndFixes),
    FieldSpec::new("fsplevel", P::ForcePolicy, K::Option, "Focus stealing prevention", S::AppearanceAndFixes)
        .options(FOCUS_LEVELS)
        .help(
            "Prevents windows from taking the focus while you're working in another window.\n\
             \"None\" will unconditionally allow this window to get the focus while\n\
             \"Extreme\" will completely prevent it from taking the focus.",
        ),
    FieldSpec::new("fpplevel", P::ForcePolicy, K::Option, "Focus protection", S::AppearanceAndFixes)
        .options(FOCUS_LEVELS)
        .help(
            "This controls the focus protection of the currently active window.\n\
             None will always give the focus away, Extreme will keep it.",
        ),
    FieldSpec::new("acceptfocus", P::ForcePolicy, K::Boolean, "Accept focus", S::AppearanceAndFixes)
        .help("Windows may prevent to get the focus (activate) when being clicked."),
    FieldSpec::new("disableglobalshortcuts", P::ForcePolicy, K::Boolean, "Ignore global shortcuts", S::AppearanceAndFixes)
        .help(
            "When used, a window will receive all keyboard inputs while it is active, including Alt+Tab.\n\
             You won't be able to leave the window with a global shortcut while it's active!",
        ),
    FieldSpec::new("closeable", P::ForcePolicy, K::Boolean, "Closeable", S::AppearanceAndFixes),
    FieldSpec::new("type", P::ForcePolicy, K::Option, "Set window type", S::AppearanceAndFixes)
        .options(WINDOW_TYPES),
    FieldSpec::new("desktopfile", P::SetPolicy, K::String, "Desktop file name", S::AppearanceAndFixes),
    FieldSpec::new("blockcompositing", P::ForcePolicy, K::Boolean, "Block compositing", S::AppearanceAndFixes),
];

static INDEX: LazyLock<HashMap<&'static str, usize>> = LazyLock::new(|| {
    FIELDS
        .iter()
        .enumerate()
        .map(|(index, spec)| (spec.key, index))
        .collect()
});

/// Read-only access to the field table
pub struct RuleFieldCatalog;

impl RuleFieldCatalog {
    pub fn fields() -> &'static [FieldSpec] {
        FIELDS
    }

    pub fn len() -> usize {
        FIELDS.len()
    }

    pub fn index_of(key: &str) -> Option<usize> {
        INDEX.get(key).copied()
    }

    pub fn get(key: &str) -> Option<&'static FieldSpec> {
        Self::index_of(key).map(|index| &FIELDS[index])
    }

    pub fn in_section(section: Section) -> impl Iterator<Item = &'static FieldSpec> {
        FIELDS.iter().filter(move |spec| spec.section == section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_keys_unique_and_indexed() {
        let keys: HashSet<_> = RuleFieldCatalog::fields().iter().map(|f| f.key).collect();
        assert_eq!(keys.len(), RuleFieldCatalog::len());
        assert_eq!(RuleFieldCatalog::len(), 40);

        for (index, spec) in RuleFieldCatalog::fields().iter().enumerate() {
            assert_eq!(RuleFieldCatalog::index_of(spec.key), Some(index));
        }
        assert!(RuleFieldCatalog::get("nosuchfield").is_none());
    }

    #[test]
    fn test_catalog_order_starts_with_matching_fields() {
        let first: Vec<_> = RuleFieldCatalog::fields().iter().take(4).map(|f| f.key).collect();
        assert_eq!(first, ["description", "wmclass", "wmclasscomplete", "types"]);
        assert_eq!(RuleFieldCatalog::in_section(Section::WindowMatching).count(), 7);
    }

    #[test]
    fn test_flags() {
        let wmclass = RuleFieldCatalog::get("wmclass").unwrap();
        assert!(wmclass.has_flag(FieldFlags::ALWAYS_ENABLED));
        assert!(wmclass.has_flag(FieldFlags::AFFECTS_WARNING | FieldFlags::AFFECTS_DESCRIPTION));
        assert!(!wmclass.has_flag(FieldFlags::START_ENABLED));

        let title = RuleFieldCatalog::get("title").unwrap();
        assert!(title.has_flag(FieldFlags::AFFECTS_DESCRIPTION));
        assert!(!title.has_flag(FieldFlags::ALWAYS_ENABLED));
    }

    #[test]
    fn test_policy_keys() {
        assert_eq!(RuleFieldCatalog::get("title").unwrap().policy_key().as_deref(), Some("titlePolicy"));
        assert_eq!(RuleFieldCatalog::get("windowrole").unwrap().policy_key(), None);
    }
}
