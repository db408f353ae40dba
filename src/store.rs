//! Ordered rule collection backed by a [`RuleBook`]
//!
//! Record `i` always lives in book slot `i + 1`. Create, remove, move and
//! import rewrite the book slots together with the in-memory sequence, so the
//! slot layout stays contiguous whether or not the store is saved afterwards.
//! Nothing reaches disk before `save`; `load` rereads the file.
//!
//! At most one record is open for editing. The open record is a working copy;
//! it is flushed back into the sequence (and its slot) before any operation
//! that changes indices or switches the edit target.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::events::{EventBus, RuleEvent};
use crate::rulebook::RuleBook;
use crate::rules::codec;
use crate::rules::{prefill, PolicyValue, PropertyBag, RecordChange, RuleRecord, TypedValue};

#[derive(Debug)]
struct EditSession {
    index: usize,
    record: RuleRecord,
    dirty: bool,
}

#[derive(Debug)]
pub struct RuleStore {
    book: RuleBook,
    rules: Vec<RuleRecord>,
    editing: Option<EditSession>,
    needs_save: bool,
    events: EventBus,
}

/// Position of `index` after the element at `source` moved to `dest`
fn remap_index(index: usize, source: usize, dest: usize) -> usize {
    if index == source {
        dest
    } else if source < dest && index > source && index <= dest {
        index - 1
    } else if dest < source && index >= dest && index < source {
        index + 1
    } else {
        index
    }
}

impl RuleStore {
    /// Wrap `book` without loading it
    pub fn new(book: RuleBook) -> Self {
        Self {
            book,
            rules: Vec::new(),
            editing: None,
            needs_save: false,
            events: EventBus::default(),
        }
    }

    /// Open the rule book at `path` and load it
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::new(RuleBook::open(path)?);
        store.materialize();
        Ok(store)
    }

    pub fn subscribe(&mut self) -> Receiver<RuleEvent> {
        self.events.subscribe()
    }

    pub fn book(&self) -> &RuleBook {
        &self.book
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Stored records; the open record's pending edits are not included
    pub fn rules(&self) -> &[RuleRecord] {
        &self.rules
    }

    /// Current view of one record, including pending edits when it is open
    pub fn rule(&self, index: usize) -> Option<&RuleRecord> {
        match &self.editing {
            Some(session) if session.index == index => Some(&session.record),
            _ => self.rules.get(index),
        }
    }

    /// Description of every record, live for the open one
    pub fn descriptions(&self) -> Vec<String> {
        (0..self.rules.len())
            .filter_map(|index| self.rule(index))
            .map(|record| record.description().to_string())
            .collect()
    }

    pub fn editor(&self) -> Option<&RuleRecord> {
        self.editing.as_ref().map(|session| &session.record)
    }

    pub fn editing_index(&self) -> Option<usize> {
        self.editing.as_ref().map(|session| session.index)
    }

    pub fn needs_save(&self) -> bool {
        self.needs_save
    }

    /// Discard unsaved changes and rebuild every record from the book.
    ///
    /// A file-backed book is read again from disk; an in-memory book is
    /// rebuilt from its current slots.
    pub fn load(&mut self) -> Result<()> {
        if let Some(path) = self.book.path().map(Path::to_path_buf) {
            self.book = RuleBook::open(path)?;
        }
        self.materialize();
        Ok(())
    }

    /// Decode every slot of the book; unreadable fields reset individually
    fn materialize(&mut self) {
        let count = self.book.count();
        self.rules = (1..=count)
            .map(|slot| match self.book.group(slot) {
                Some(group) => codec::decode(group),
                None => {
                    debug!(slot, "Rule book slot missing, using defaults");
                    RuleRecord::new()
                }
            })
            .collect();

        match self.editing.take() {
            Some(session) if session.index < self.rules.len() => {
                self.editing = Some(EditSession {
                    record: self.rules[session.index].clone(),
                    dirty: false,
                    ..session
                });
            }
            Some(session) => {
                debug!(index = session.index, count, "Open rule no longer exists after load");
                self.events.emit(RuleEvent::EditingIndexChanged(None));
            }
            None => {}
        }

        self.needs_save = false;
        info!(count, "Loaded window rules");
        self.events.emit(RuleEvent::RuleBookChanged);
    }

    /// Flush, encode every record into its slot and write the book
    pub fn save(&mut self) -> Result<()> {
        self.flush_editor();

        for (index, record) in self.rules.iter().enumerate() {
            self.book.set_group(index + 1, codec::encode(record));
        }
        self.book.set_count(self.rules.len());
        self.book.prune_stale_slots();
        self.book.save()?;

        self.needs_save = false;
        self.events.emit(RuleEvent::Saved);
        Ok(())
    }

    /// Append a default record and open it; returns its index
    pub fn new_rule(&mut self) -> usize {
        self.flush_editor();

        let record = RuleRecord::new();
        let index = self.rules.len();
        self.book.set_group(index + 1, codec::encode(&record));
        self.book.set_count(index + 1);
        self.rules.push(record);
        self.needs_save = true;

        info!(index, "Created window rule");
        self.events.emit(RuleEvent::RuleBookChanged);
        self.open_editor(index);
        index
    }

    /// Remove the record at `index`, compacting the slots behind it
    pub fn remove_rule(&mut self, index: usize) -> bool {
        if index >= self.rules.len() {
            debug!(index, count = self.rules.len(), "Remove index out of range");
            return false;
        }
        self.flush_editor();

        let removed = self.rules.remove(index);
        self.book.remove_slot(index + 1);

        match self.editing_index() {
            Some(open) if open == index => {
                self.editing = None;
                self.events.emit(RuleEvent::EditingIndexChanged(None));
            }
            Some(open) if open > index => {
                if let Some(session) = self.editing.as_mut() {
                    session.index = open - 1;
                }
                self.events.emit(RuleEvent::EditingIndexChanged(Some(open - 1)));
            }
            _ => {}
        }

        self.needs_save = true;
        info!(index, description = %removed.description(), "Removed window rule");
        self.events.emit(RuleEvent::RuleBookChanged);
        true
    }

    /// Move the record at `source` to `dest`, sliding the records in between
    pub fn move_rule(&mut self, source: usize, dest: usize) -> bool {
        let count = self.rules.len();
        if source >= count || dest >= count || source == dest {
            debug!(source, dest, count, "Ignoring move");
            return false;
        }
        self.flush_editor();

        let record = self.rules.remove(source);
        self.rules.insert(dest, record);
        self.book.move_slot(source + 1, dest + 1);

        if let Some(session) = self.editing.as_mut() {
            let remapped = remap_index(session.index, source, dest);
            if remapped != session.index {
                session.index = remapped;
                self.events.emit(RuleEvent::EditingIndexChanged(Some(remapped)));
            }
        }

        self.needs_save = true;
        debug!(source, dest, "Moved window rule");
        self.events.emit(RuleEvent::RuleBookChanged);
        true
    }

    /// Flush the open record and open `index` instead
    pub fn edit_rule(&mut self, index: usize) -> bool {
        if index >= self.rules.len() {
            debug!(index, count = self.rules.len(), "Edit index out of range");
            return false;
        }
        if self.editing_index() == Some(index) {
            return true;
        }
        self.flush_editor();
        self.open_editor(index);
        true
    }

    /// Flush and close the open record
    pub fn close_editor(&mut self) {
        self.flush_editor();
        if self.editing.take().is_some() {
            self.events.emit(RuleEvent::EditingIndexChanged(None));
        }
    }

    fn open_editor(&mut self, index: usize) {
        self.editing = Some(EditSession {
            index,
            record: self.rules[index].clone(),
            dirty: false,
        });
        self.events.emit(RuleEvent::EditingIndexChanged(Some(index)));
    }

    /// Write pending edits of the open record back into the sequence and its slot
    pub fn flush_editor(&mut self) {
        let Some(session) = self.editing.as_mut() else {
            return;
        };
        if !session.dirty {
            return;
        }

        self.book.set_group(session.index + 1, codec::encode(&session.record));
        self.rules[session.index] = session.record.clone();
        session.dirty = false;
        self.needs_save = true;
        debug!(index = session.index, "Flushed rule edits");
    }

    pub fn set_enabled(&mut self, key: &str, enabled: bool) -> bool {
        self.edit(|record| record.set_enabled(key, enabled))
    }

    pub fn set_value(&mut self, key: &str, value: TypedValue) -> bool {
        self.edit(|record| record.set_value(key, value))
    }

    pub fn set_policy(&mut self, key: &str, policy: PolicyValue) -> bool {
        self.edit(|record| record.set_policy(key, policy))
    }

    pub fn reset_item(&mut self, key: &str) -> bool {
        self.edit(|record| record.reset_item(key))
    }

    fn edit(&mut self, f: impl FnOnce(&mut RuleRecord) -> Option<RecordChange>) -> bool {
        let Some(session) = self.editing.as_mut() else {
            debug!("No window rule open for editing");
            return false;
        };
        let Some(change) = f(&mut session.record) else {
            return false;
        };

        session.dirty = true;
        self.needs_save = true;
        let description = session.record.description().to_string();
        let warning = session.record.warning();

        self.events.emit(RuleEvent::DataChanged { key: change.key });
        if change.description_changed {
            self.events.emit(RuleEvent::DescriptionChanged(description));
        }
        if change.warning_changed {
            self.events.emit(RuleEvent::WarningChanged(warning));
        }
        true
    }

    /// Merge a property snapshot into the open record; returns the number of fields written
    pub fn apply_window_properties(&mut self, bag: &PropertyBag) -> usize {
        let Some(session) = self.editing.as_mut() else {
            warn!("Window properties arrived with no rule open, discarding");
            return 0;
        };

        let description = session.record.description().to_string();
        let warning = session.record.warning();
        let changed = prefill(&mut session.record, bag);
        if changed.is_empty() {
            return 0;
        }

        session.dirty = true;
        self.needs_save = true;
        let new_description = session.record.description().to_string();
        let new_warning = session.record.warning();

        for &key in &changed {
            self.events.emit(RuleEvent::DataChanged { key });
        }
        if new_description != description {
            self.events.emit(RuleEvent::DescriptionChanged(new_description));
        }
        if new_warning != warning {
            self.events.emit(RuleEvent::WarningChanged(new_warning));
        }

        info!(fields = changed.len(), "Applied detected window properties");
        changed.len()
    }

    /// Write the record at `index` to a standalone file; out of range is a no-op
    pub fn export_rule(&self, index: usize, path: &Path) -> Result<()> {
        let Some(record) = self.rule(index) else {
            warn!(index, count = self.rules.len(), "Export index out of range");
            return Ok(());
        };
        codec::write_export(record, path)
    }

    /// Suggested export file for the record at `index` inside `dir`
    pub fn default_export_path(&self, index: usize, dir: &Path) -> Option<PathBuf> {
        self.rule(index).map(|record| codec::export_path(dir, record.description()))
    }

    /// Merge every rule from an import file by description.
    ///
    /// The file is parsed in full before anything changes. Returns the number
    /// of records replaced, appended or deleted.
    pub fn import_rules(&mut self, path: &Path) -> Result<usize> {
        let entries = codec::read_import(path)?;
        self.flush_editor();

        let mut applied = 0;
        for entry in entries {
            let existing = self
                .rules
                .iter()
                .position(|record| record.description() == entry.description);

            match (existing, entry.delete) {
                (Some(index), true) => {
                    self.remove_rule(index);
                    applied += 1;
                }
                (None, true) => {
                    debug!(description = %entry.description, "No rule matches deletion request");
                }
                (Some(index), false) => {
                    self.book.set_group(index + 1, codec::encode(&entry.record));
                    if let Some(session) = self.editing.as_mut().filter(|s| s.index == index) {
                        session.record = entry.record.clone();
                        session.dirty = false;
                    }
                    self.rules[index] = entry.record;
                    debug!(index, description = %entry.description, "Replaced rule from import");
                    applied += 1;
                }
                (None, false) => {
                    let index = self.rules.len();
                    self.book.set_group(index + 1, codec::encode(&entry.record));
                    self.book.set_count(index + 1);
                    self.rules.push(entry.record);
                    debug!(index, description = %entry.description, "Appended rule from import");
                    applied += 1;
                }
            }
        }

        if applied > 0 {
            self.needs_save = true;
            self.events.emit(RuleEvent::RuleBookChanged);
        }
        info!(path = %path.display(), applied, "Imported window rules");
        Ok(applied)
    }
}
