#![forbid(unsafe_code)]

pub mod config;
pub mod constants;
pub mod events;
pub mod probe;
pub mod rulebook;
pub mod rules;
pub mod store;
pub mod x11_utils;

pub use events::RuleEvent;
pub use rulebook::RuleBook;
pub use store::RuleStore;
