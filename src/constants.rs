//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Configuration file locations
pub mod config {
    /// Directory under the user's config dir
    pub const APP_DIR: &str = "window-rules";

    /// Application settings file name
    pub const FILENAME: &str = "config.toml";

    /// Default rule book file name
    pub const RULEBOOK_FILENAME: &str = "rules.toml";

    /// Env var overriding the rule book location
    pub const RULEBOOK_ENV: &str = "WINDOW_RULES_FILE";

    /// Env var overriding the log level
    pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
}

/// Persisted rule book schema
pub mod rulebook {
    /// Group holding the slot count
    pub const GENERAL_GROUP: &str = "General";

    /// Key of the slot count inside the general group
    pub const COUNT_KEY: &str = "count";

    /// Suffix appended to a field key to form its policy key
    pub const POLICY_SUFFIX: &str = "Policy";

    /// Boolean key marking an imported group as a deletion request
    pub const DELETE_KEY: &str = "deleteRule";

    /// Persisted policy value meaning "rule does not apply this field"
    pub const UNUSED_POLICY: i64 = 0;

    /// Extension of single-rule export files
    pub const EXPORT_EXTENSION: &str = "winrule";
}

/// Window type identifiers (bit positions in the `types` mask)
pub mod window_type {
    pub const UNKNOWN: i64 = -1;
    pub const NORMAL: i64 = 0;
    pub const DESKTOP: i64 = 1;
    pub const DOCK: i64 = 2;
    pub const TOOLBAR: i64 = 3;
    pub const MENU: i64 = 4;
    pub const DIALOG: i64 = 5;
    pub const OVERRIDE: i64 = 6;
    pub const TOP_MENU: i64 = 7;
    pub const UTILITY: i64 = 8;
    pub const SPLASH: i64 = 9;

    /// Mask meaning "every window type"
    pub const ALL_TYPES_MASK: u32 = 0xFFFF;

    /// Mask covering Normal through Splash
    pub const CLASSIC_TYPES_MASK: u32 = 0x3FF;
}

/// Virtual desktop option values
pub mod desktop {
    /// Pseudo desktop number meaning "on all desktops"
    pub const ON_ALL_DESKTOPS: i64 = -1;
}

/// Default descriptions derived from window properties
pub mod description {
    pub const NEW_RULE: &str = "New window settings";
    pub const TITLE_PREFIX: &str = "Window settings for ";
    pub const CLASS_PREFIX: &str = "Settings for ";
}

/// Value ranges enforced on config and rule values
pub mod validation {
    /// Upper bound of a Percentage value
    pub const MAX_PERCENTAGE: u8 = 100;

    /// Longest delay accepted before probing window properties
    pub const MAX_DETECT_DELAY_SECS: u64 = 60;

    /// Default delay before probing window properties
    pub const DEFAULT_DETECT_DELAY_SECS: u64 = 3;
}
