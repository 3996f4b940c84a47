use std::fmt;

/// Number of local variable or operand stack slots a value occupies
pub trait Width {
    fn width(&self) -> usize;
}

/// Values laid out over JVM slots, where a value may span more than one slot
///
/// Entries are addressed by their starting slot rather than by their position. Both the operand
/// stack and the local variables of a simulated frame are kept this way, since `long` and
/// `double` take up two slots each.
#[derive(Clone, PartialEq, Eq)]
pub struct SlotVec<T> {
    /// Each entry along with its starting slot, in slot order
    entries: Vec<(usize, T)>,

    /// Slot of the next entry pushed
    next_slot: usize,
}

impl<T: Width> SlotVec<T> {
    pub fn new() -> SlotVec<T> {
        SlotVec {
            entries: vec![],
            next_slot: 0,
        }
    }

    /// Number of entries (not slots)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total width of the entries
    pub fn slots(&self) -> usize {
        self.next_slot
    }

    pub fn push(&mut self, value: T) {
        let slot = self.next_slot;
        self.next_slot += value.width();
        self.entries.push((slot, value));
    }

    pub fn pop(&mut self) -> Option<T> {
        let (slot, value) = self.entries.pop()?;
        self.next_slot = slot;
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_slot = 0;
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.last().map(|(_, value)| value)
    }

    /// Entry starting at the given slot (`None` past the end or in the middle of a wide entry)
    pub fn get(&self, slot: usize) -> Option<&T> {
        self.entries
            .binary_search_by_key(&slot, |(start, _)| *start)
            .ok()
            .map(|idx| &self.entries[idx].1)
    }

    /// Put a value at a slot, whatever was there
    ///
    /// Slots left uncovered, either skipped over when setting past the end or the remaining
    /// half of a wide entry that got overwritten, are filled with `filler` (which must be one
    /// slot wide).
    pub fn set(&mut self, slot: usize, value: T, filler: impl Fn() -> T) {
        let end = slot + value.width();
        let mut value = Some(value);
        let mut rebuilt = SlotVec::new();

        for (start, existing) in std::mem::take(&mut self.entries) {
            let existing_end = start + existing.width();
            if existing_end <= slot || start >= end {
                if start >= end {
                    rebuilt.place(slot, &mut value, &filler);
                }
                rebuilt.pad_to(start, &filler);
                rebuilt.push(existing);
            } else {
                rebuilt.place(slot, &mut value, &filler);
                rebuilt.pad_to(existing_end, &filler);
            }
        }
        rebuilt.place(slot, &mut value, &filler);
        *self = rebuilt;
    }

    fn pad_to(&mut self, slot: usize, filler: &impl Fn() -> T) {
        while self.next_slot < slot {
            self.push(filler());
        }
    }

    fn place(&mut self, slot: usize, value: &mut Option<T>, filler: &impl Fn() -> T) {
        if let Some(value) = value.take() {
            self.pad_to(slot, filler);
            self.push(value);
        }
    }

    /// Entries along with their starting slot
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (usize, &T)> {
        self.entries.iter().map(|(slot, value)| (*slot, value))
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter().map(|(_, value)| value)
    }

    /// Replace every entry with the given function (which must preserve widths)
    pub fn map_in_place(&mut self, f: impl Fn(&T) -> Option<T>) {
        for (_, value) in &mut self.entries {
            if let Some(updated) = f(value) {
                *value = updated;
            }
        }
    }
}

impl<T: Width> Default for SlotVec<T> {
    fn default() -> Self {
        SlotVec::new()
    }
}

impl<T: Width> FromIterator<T> for SlotVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(values: I) -> Self {
        let mut slots = SlotVec::new();
        slots.extend(values);
        slots
    }
}

impl<T: Width> Extend<T> for SlotVec<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, values: I) {
        for value in values {
            self.push(value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SlotVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(slot, value)| (slot, value)))
            .finish()
    }
}
