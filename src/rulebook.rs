//! Persisted rule book: a general group holding the slot count plus one
//! numbered group per rule, `"1"` through `"count"`

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toml::Value;
use tracing::{debug, info, warn};

use crate::constants::rulebook::{COUNT_KEY, GENERAL_GROUP};
use crate::rules::RawGroup;

#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    /// `None` keeps the book in memory only
    path: Option<PathBuf>,
    groups: toml::Table,
}

fn slot_key(slot: usize) -> String {
    slot.to_string()
}

impl RuleBook {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the book at `path`; a missing file is an empty book
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            info!(path = %path.display(), "No rule book found, starting empty");
            return Ok(Self {
                path: Some(path),
                groups: toml::Table::new(),
            });
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read rule book from {}", path.display()))?;
        let groups: toml::Table = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse rule book TOML from {}", path.display()))?;

        let mut book = Self {
            path: Some(path),
            groups,
        };
        book.cap_count();
        debug!(path = ?book.path, count = book.count(), "Opened rule book");
        Ok(book)
    }

    /// Clamp a stored count to the highest numbered group actually present
    fn cap_count(&mut self) {
        let stored = self.count();
        let present = self
            .groups
            .keys()
            .filter_map(|name| name.parse::<usize>().ok())
            .filter(|slot| (1..=stored).contains(slot))
            .max()
            .unwrap_or(0);
        if stored > present {
            warn!(stored, present, "Rule book count exceeds its numbered groups, capping");
            self.set_count(present);
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of slots; a missing or negative count reads as zero
    pub fn count(&self) -> usize {
        self.groups
            .get(GENERAL_GROUP)
            .and_then(|general| general.get(COUNT_KEY))
            .and_then(Value::as_integer)
            .and_then(|count| usize::try_from(count).ok())
            .unwrap_or(0)
    }

    pub fn set_count(&mut self, count: usize) {
        let general = self
            .groups
            .entry(GENERAL_GROUP)
            .or_insert_with(|| Value::Table(toml::Table::new()));
        if !general.is_table() {
            *general = Value::Table(toml::Table::new());
        }
        if let Value::Table(general) = general {
            general.insert(COUNT_KEY.to_string(), Value::Integer(count as i64));
        }
    }

    /// Group stored at 1-based `slot`
    pub fn group(&self, slot: usize) -> Option<&RawGroup> {
        self.groups.get(&slot_key(slot)).and_then(Value::as_table)
    }

    pub fn set_group(&mut self, slot: usize, group: RawGroup) {
        self.groups.insert(slot_key(slot), Value::Table(group));
    }

    pub fn take_group(&mut self, slot: usize) -> Option<RawGroup> {
        match self.groups.remove(&slot_key(slot))? {
            Value::Table(group) => Some(group),
            _ => None,
        }
    }

    /// Move the group at `from` into `to`, clearing `to` when `from` is empty
    fn relocate(&mut self, from: usize, to: usize) {
        match self.take_group(from) {
            Some(group) => self.set_group(to, group),
            None => {
                self.take_group(to);
            }
        }
    }

    /// Delete `slot` by rotating every later slot down by one.
    ///
    /// Returns `false` if `slot` is outside `1..=count`.
    pub fn remove_slot(&mut self, slot: usize) -> bool {
        let count = self.count();
        if slot == 0 || slot > count {
            return false;
        }

        for current in slot..count {
            self.relocate(current + 1, current);
        }
        self.take_group(count);
        self.set_count(count - 1);

        debug!(slot, count = count - 1, "Removed rule book slot");
        true
    }

    /// Slide the group at `source` into `dest` through one holding slot,
    /// shifting every slot in between one step toward `source`.
    ///
    /// Returns `false` if either slot is outside `1..=count` or they are equal.
    pub fn move_slot(&mut self, source: usize, dest: usize) -> bool {
        let count = self.count();
        if source == dest || source == 0 || dest == 0 || source > count || dest > count {
            return false;
        }

        let held = self.take_group(source);
        if source < dest {
            for current in source..dest {
                self.relocate(current + 1, current);
            }
        } else {
            for current in (dest + 1..=source).rev() {
                self.relocate(current - 1, current);
            }
        }
        match held {
            Some(group) => self.set_group(dest, group),
            None => {
                self.take_group(dest);
            }
        }

        debug!(source, dest, "Moved rule book slot");
        true
    }

    /// Drop numbered groups beyond the current count
    pub fn prune_stale_slots(&mut self) {
        let count = self.count();
        let stale: Vec<String> = self
            .groups
            .keys()
            .filter(|name| name.parse::<usize>().is_ok_and(|slot| slot == 0 || slot > count))
            .cloned()
            .collect();

        for name in stale {
            debug!(group = %name, "Dropping stale rule book slot");
            self.groups.remove(&name);
        }
    }

    /// Write the book with the general group first and slots in numeric order
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            debug!("Rule book is in-memory, skipping write");
            return Ok(());
        };

        let count = self.count();
        let mut ordered = toml::Table::new();
        if let Some(general) = self.groups.get(GENERAL_GROUP) {
            ordered.insert(GENERAL_GROUP.to_string(), general.clone());
        }
        for slot in 1..=count {
            if let Some(group) = self.groups.get(&slot_key(slot)) {
                ordered.insert(slot_key(slot), group.clone());
            }
        }
        for (name, value) in &self.groups {
            if !ordered.contains_key(name) {
                ordered.insert(name.clone(), value.clone());
            }
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create rule book directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(&ordered).context("Failed to serialize rule book to TOML")?;
        fs::write(path, contents).with_context(|| format!("Failed to write rule book to {}", path.display()))?;

        info!(path = %path.display(), count, "Saved rule book");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(label: &str) -> RawGroup {
        let mut group = RawGroup::new();
        group.insert("description".into(), Value::String(label.into()));
        group
    }

    fn book_with(labels: &[&str]) -> RuleBook {
        let mut book = RuleBook::in_memory();
        for (index, label) in labels.iter().enumerate() {
            book.set_group(index + 1, labelled(label));
        }
        book.set_count(labels.len());
        book
    }

    fn labels(book: &RuleBook) -> Vec<String> {
        (1..=book.count())
            .map(|slot| {
                book.group(slot)
                    .and_then(|g| g.get("description"))
                    .and_then(Value::as_str)
                    .unwrap_or("<missing>")
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_empty_book() {
        let book = RuleBook::in_memory();
        assert_eq!(book.count(), 0);
        assert!(book.group(1).is_none());
        assert!(book.path().is_none());
    }

    #[test]
    fn test_remove_slot_rotates_tail() {
        let mut book = book_with(&["A", "B", "C", "D"]);
        assert!(book.remove_slot(2));
        assert_eq!(book.count(), 3);
        assert_eq!(labels(&book), ["A", "C", "D"]);
        assert!(book.group(4).is_none());

        assert!(!book.remove_slot(0));
        assert!(!book.remove_slot(4));
        assert_eq!(book.count(), 3);
    }

    #[test]
    fn test_move_slot_both_directions() {
        let mut book = book_with(&["A", "B", "C", "D", "E"]);
        assert!(book.move_slot(1, 4));
        assert_eq!(labels(&book), ["B", "C", "D", "A", "E"]);

        assert!(book.move_slot(5, 2));
        assert_eq!(labels(&book), ["B", "E", "C", "D", "A"]);

        assert!(!book.move_slot(3, 3));
        assert!(!book.move_slot(1, 6));
        assert_eq!(book.count(), 5);
    }

    #[test]
    fn test_prune_stale_slots() {
        let mut book = book_with(&["A", "B"]);
        book.set_group(3, labelled("stale"));
        book.set_group(7, labelled("stale"));
        book.prune_stale_slots();
        assert!(book.group(3).is_none());
        assert!(book.group(7).is_none());
        assert_eq!(labels(&book), ["A", "B"]);
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rules.toml");

        let mut book = RuleBook::open(&path).unwrap();
        assert_eq!(book.count(), 0);
        book.set_group(2, labelled("B"));
        book.set_group(1, labelled("A"));
        book.set_count(2);
        book.save().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let general = text.find("[General]").unwrap();
        let first = text.find("description = \"A\"").unwrap();
        let second = text.find("description = \"B\"").unwrap();
        assert!(general < first && first < second);

        let reopened = RuleBook::open(&path).unwrap();
        assert_eq!(labels(&reopened), ["A", "B"]);
    }

    #[test]
    fn test_open_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        fs::write(&path, "[General\ncount = ").unwrap();
        assert!(RuleBook::open(&path).is_err());
    }

    #[test]
    fn test_open_caps_count_to_present_groups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        fs::write(
            &path,
            "[General]\ncount = 100000000\n\n[1]\ndescription = \"A\"\n\n[3]\ndescription = \"C\"\n",
        )
        .unwrap();

        let book = RuleBook::open(&path).unwrap();
        assert_eq!(book.count(), 3);
        // gaps below the highest group stay as default slots
        assert_eq!(labels(&book), ["A", "<missing>", "C"]);

        fs::write(&path, "[General]\ncount = 5\n").unwrap();
        assert_eq!(RuleBook::open(&path).unwrap().count(), 0);
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let book = book_with(&["A"]);
        assert!(book.save().is_ok());
    }
}
