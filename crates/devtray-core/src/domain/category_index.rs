//! CategoryIndex: where each device entry sits in the flat tray menu.
//!
//! # Layout (for beginners)
//!
//! Categories have a fixed order (`block`, `usb`, `mic`).  Each category owns
//! a contiguous *region* of the flat menu, and a separator slot sits between
//! neighbouring regions:
//!
//! ```text
//! [ block region ][sep 1][ usb region ][sep 2][ mic region ]
//!   start(0) = 0          start(1)             start(2)
//! ```
//!
//! Separator slots always exist; only their visibility changes.  Separator
//! `i` is visible iff category `i` has at least one device.
//!
//! # Incremental offsets
//!
//! Region start offsets are kept in a table and adjusted incrementally: an
//! insert into category `i` shifts the start of every later category by one,
//! a removal shifts them back.  Nothing is recomputed from scratch, so
//! [`CategoryIndex::is_consistent`] exists to let tests prove the table never
//! drifts from the region sizes.
//!
//! # Ordering within a region
//!
//! Entries are ordered by [`SortKey`] (backend domain name, then identifier).
//! The insertion index is found by a linear scan counting the entries whose
//! key is strictly smaller than the new one.
//!
//! The index holds only back-references (device id → category); it never
//! owns a [`crate::Device`].

use std::collections::HashMap;

use tracing::debug;

use crate::domain::model::{Category, DeviceId, SortKey};
use crate::protocol::changes::MenuChange;

#[derive(Debug, Clone)]
struct Entry {
    key: SortKey,
    device: DeviceId,
}

/// Ordered grouping of device entries by category.
#[derive(Debug)]
pub struct CategoryIndex {
    /// Start offset of each category's region in the flat menu.
    starts: [usize; Category::COUNT],
    /// Entries of each region, kept sorted by key.
    regions: [Vec<Entry>; Category::COUNT],
    /// Which category each indexed device lives in.
    locations: HashMap<DeviceId, Category>,
}

impl Default for CategoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryIndex {
    /// Creates an empty index: every region is empty and every separator
    /// slot is hidden.
    pub fn new() -> Self {
        let mut starts = [0; Category::COUNT];
        for (i, start) in starts.iter_mut().enumerate() {
            // One separator slot in front of every category but the first.
            *start = i;
        }
        Self {
            starts,
            regions: Default::default(),
            locations: HashMap::new(),
        }
    }

    /// Inserts a device entry into its category's region.
    ///
    /// Returns the changes the presentation layer must apply: the insert
    /// itself and, when the region just became non-empty, the separator in
    /// front of it.  Inserting an already-indexed device returns no changes.
    pub fn insert(&mut self, device: DeviceId, category: Category, key: SortKey) -> Vec<MenuChange> {
        if self.locations.contains_key(&device) {
            debug!(device = %device, "device already indexed");
            return Vec::new();
        }

        let c = category.index();
        let region = &mut self.regions[c];
        let offset = region.iter().filter(|e| e.key < key).count();
        region.insert(
            offset,
            Entry {
                key,
                device: device.clone(),
            },
        );
        let became_non_empty = region.len() == 1;

        let position = self.starts[c] + offset;
        for start in &mut self.starts[c + 1..] {
            *start += 1;
        }
        self.locations.insert(device.clone(), category);

        let mut changes = vec![MenuChange::InsertDevice { position, device }];
        if c > 0 && became_non_empty {
            changes.push(MenuChange::ShowSeparator(c));
        }
        changes
    }

    /// Removes a device entry.
    ///
    /// Returns the removal and, when the region just became empty, the
    /// separator to hide.  Removing an unknown device returns no changes.
    pub fn remove(&mut self, device: &DeviceId) -> Vec<MenuChange> {
        let Some(category) = self.locations.remove(device) else {
            debug!(device = %device, "device not indexed");
            return Vec::new();
        };

        let c = category.index();
        let region = &mut self.regions[c];
        let Some(offset) = region.iter().position(|e| &e.device == device) else {
            debug!(device = %device, "device missing from its region");
            return Vec::new();
        };
        region.remove(offset);
        let became_empty = region.is_empty();

        let position = self.starts[c] + offset;
        for start in &mut self.starts[c + 1..] {
            *start -= 1;
        }

        let mut changes = vec![MenuChange::RemoveDevice {
            position,
            device: device.clone(),
        }];
        if c > 0 && became_empty {
            changes.push(MenuChange::HideSeparator(c));
        }
        changes
    }

    /// Current flat-menu position of a device entry.
    pub fn position_of(&self, device: &DeviceId) -> Option<usize> {
        let category = self.locations.get(device)?;
        let c = category.index();
        let offset = self.regions[c].iter().position(|e| &e.device == device)?;
        Some(self.starts[c] + offset)
    }

    /// Key a device entry was ordered by when it was inserted.
    pub fn key_of(&self, device: &DeviceId) -> Option<&SortKey> {
        let category = self.locations.get(device)?;
        self.regions[category.index()]
            .iter()
            .find(|e| &e.device == device)
            .map(|e| &e.key)
    }

    pub fn contains(&self, device: &DeviceId) -> bool {
        self.locations.contains_key(device)
    }

    /// Number of devices in a category.
    pub fn count(&self, category: Category) -> usize {
        self.regions[category.index()].len()
    }

    /// Devices of a category in menu order.
    pub fn devices(&self, category: Category) -> Vec<&DeviceId> {
        self.regions[category.index()]
            .iter()
            .map(|e| &e.device)
            .collect()
    }

    /// Flat-menu offset where a category's region begins.
    pub fn region_start(&self, category: Category) -> usize {
        self.starts[category.index()]
    }

    /// Flat-menu position of separator `index` (`1..Category::COUNT`).
    pub fn separator_position(&self, index: usize) -> Option<usize> {
        if index == 0 || index >= Category::COUNT {
            return None;
        }
        Some(self.starts[index] - 1)
    }

    /// Whether separator `index` should be shown.
    ///
    /// There is no separator before the first category, so index `0` (and
    /// anything past the last category) is never visible.
    pub fn separator_visible(&self, index: usize) -> bool {
        index > 0 && index < Category::COUNT && !self.regions[index].is_empty()
    }

    /// Total number of slots in the flat menu, separators included.
    pub fn len(&self) -> usize {
        self.locations.len() + Category::COUNT - 1
    }

    /// Number of indexed devices.
    pub fn device_count(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Checks the incremental bookkeeping against a from-scratch computation.
    ///
    /// `true` when every region start equals the sum of the preceding region
    /// sizes plus separator slots, every region is sorted, and the
    /// back-references match the regions exactly.
    pub fn is_consistent(&self) -> bool {
        let mut expected_start = 0;
        for (i, region) in self.regions.iter().enumerate() {
            if i > 0 {
                expected_start += 1;
            }
            if self.starts[i] != expected_start {
                return false;
            }
            if region.windows(2).any(|w| w[0].key > w[1].key) {
                return false;
            }
            let category = Category::ALL[i];
            if region
                .iter()
                .any(|e| self.locations.get(&e.device) != Some(&category))
            {
                return false;
            }
            expected_start += region.len();
        }
        let indexed: usize = self.regions.iter().map(Vec::len).sum();
        indexed == self.locations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> DeviceId {
        DeviceId::new(s)
    }

    fn key(s: &str) -> SortKey {
        let (name, ident) = s.split_once(':').unwrap();
        SortKey::new(name, ident)
    }

    #[test]
    fn test_new_index_has_hidden_separator_slots() {
        let index = CategoryIndex::new();
        assert_eq!(index.region_start(Category::Block), 0);
        assert_eq!(index.region_start(Category::Usb), 1);
        assert_eq!(index.region_start(Category::Mic), 2);
        assert_eq!(index.len(), Category::COUNT - 1);
        assert!(!index.separator_visible(1));
        assert!(!index.separator_visible(2));
        assert!(index.is_consistent());
    }

    #[test]
    fn test_insert_first_block_device_at_top_without_separator() {
        let mut index = CategoryIndex::new();
        let changes = index.insert(id("a:1"), Category::Block, key("a:1"));
        assert_eq!(
            changes,
            vec![MenuChange::InsertDevice {
                position: 0,
                device: id("a:1")
            }]
        );
        assert_eq!(index.region_start(Category::Usb), 2);
    }

    #[test]
    fn test_key_of_returns_key_used_at_insert() {
        let mut index = CategoryIndex::new();
        index.insert(id("a:1"), Category::Mic, key("a:1"));

        assert_eq!(index.key_of(&id("a:1")), Some(&key("a:1")));
        assert_eq!(index.key_of(&id("b:1")), None);
    }

    #[test]
    fn test_insert_first_usb_device_shows_separator() {
        // Arrange
        let mut index = CategoryIndex::new();
        index.insert(id("a:1"), Category::Block, key("a:1"));

        // Act
        let changes = index.insert(id("b:2-1"), Category::Usb, key("b:2-1"));

        // Assert: block(0), sep1(1), usb(2)
        assert_eq!(
            changes,
            vec![
                MenuChange::InsertDevice {
                    position: 2,
                    device: id("b:2-1")
                },
                MenuChange::ShowSeparator(1),
            ]
        );
        assert!(index.separator_visible(1));
        assert_eq!(index.separator_position(1), Some(1));
    }

    #[test]
    fn test_second_device_in_category_does_not_repeat_separator() {
        let mut index = CategoryIndex::new();
        index.insert(id("b:1"), Category::Mic, key("b:1"));
        let changes = index.insert(id("a:1"), Category::Mic, key("a:1"));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_block_order_is_independent_of_arrival_order() {
        let orders = [
            ["a:1", "a:2", "b:1"],
            ["a:1", "b:1", "a:2"],
            ["a:2", "a:1", "b:1"],
            ["a:2", "b:1", "a:1"],
            ["b:1", "a:1", "a:2"],
            ["b:1", "a:2", "a:1"],
        ];
        for order in orders {
            let mut index = CategoryIndex::new();
            for k in order {
                index.insert(id(k), Category::Block, key(k));
            }
            let got: Vec<&str> = index
                .devices(Category::Block)
                .iter()
                .map(|d| d.as_str())
                .collect();
            assert_eq!(got, vec!["a:1", "a:2", "b:1"], "arrival order {order:?}");
            assert!(index.is_consistent());
        }
    }

    #[test]
    fn test_insert_position_uses_strictly_smaller_count() {
        let mut index = CategoryIndex::new();
        index.insert(id("a:1"), Category::Usb, key("a:1"));
        index.insert(id("c:1"), Category::Usb, key("c:1"));

        let changes = index.insert(id("b:1"), Category::Usb, key("b:1"));

        // usb region starts at 1 (after sep 1); b:1 lands between a:1 and c:1.
        assert_eq!(
            changes[0],
            MenuChange::InsertDevice {
                position: 2,
                device: id("b:1")
            }
        );
    }

    #[test]
    fn test_insert_into_earlier_category_shifts_later_regions() {
        let mut index = CategoryIndex::new();
        index.insert(id("m:1"), Category::Mic, key("m:1"));
        assert_eq!(index.position_of(&id("m:1")), Some(2));

        index.insert(id("u:1"), Category::Usb, key("u:1"));
        index.insert(id("b:1"), Category::Block, key("b:1"));

        assert_eq!(index.position_of(&id("b:1")), Some(0));
        assert_eq!(index.position_of(&id("u:1")), Some(2));
        assert_eq!(index.position_of(&id("m:1")), Some(4));
        assert!(index.is_consistent());
    }

    #[test]
    fn test_remove_last_device_of_category_hides_separator() {
        let mut index = CategoryIndex::new();
        index.insert(id("b:1"), Category::Block, key("b:1"));
        index.insert(id("u:1"), Category::Usb, key("u:1"));

        let changes = index.remove(&id("u:1"));

        assert_eq!(
            changes,
            vec![
                MenuChange::RemoveDevice {
                    position: 2,
                    device: id("u:1")
                },
                MenuChange::HideSeparator(1),
            ]
        );
        assert!(!index.separator_visible(1));
        assert!(index.is_consistent());
    }

    #[test]
    fn test_remove_from_earlier_category_shifts_later_regions_back() {
        let mut index = CategoryIndex::new();
        index.insert(id("b:1"), Category::Block, key("b:1"));
        index.insert(id("b:2"), Category::Block, key("b:2"));
        index.insert(id("m:1"), Category::Mic, key("m:1"));

        index.remove(&id("b:1"));

        assert_eq!(index.position_of(&id("b:2")), Some(0));
        assert_eq!(index.position_of(&id("m:1")), Some(3));
        assert_eq!(index.region_start(Category::Mic), 3);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_duplicate_insert_and_unknown_remove_are_noops() {
        let mut index = CategoryIndex::new();
        index.insert(id("a:1"), Category::Block, key("a:1"));
        assert!(index
            .insert(id("a:1"), Category::Block, key("a:1"))
            .is_empty());
        assert!(index.remove(&id("ghost:1")).is_empty());
        assert_eq!(index.device_count(), 1);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_separator_zero_is_never_visible() {
        let mut index = CategoryIndex::new();
        index.insert(id("a:1"), Category::Block, key("a:1"));
        assert!(!index.separator_visible(0));
        assert_eq!(index.separator_position(0), None);
        assert_eq!(index.separator_position(Category::COUNT), None);
    }
}
