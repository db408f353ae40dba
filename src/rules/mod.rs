//! Rule data model: field catalog, typed values, items, records and their
//! persisted encoding

pub mod catalog;
pub mod codec;
pub mod item;
pub mod prefill;
pub mod record;
pub mod value;

pub use catalog::{FieldFlags, FieldSpec, OptionData, RuleFieldCatalog, Section};
pub use codec::{ImportEntry, RawGroup};
pub use item::RuleItem;
pub use prefill::{prefill, PropertyBag};
pub use record::{ItemFilter, RecordChange, RuleRecord};
pub use value::{ApplyPolicy, MatchPolicy, PolicyKind, PolicyValue, TypedValue, ValueKind};
