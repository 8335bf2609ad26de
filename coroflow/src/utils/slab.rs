/// A simple slab allocator.
///
/// A `Slab` stores values of type `T` in a contiguous array and
/// returns stable keys that are reused after removal.
///
/// The runtime keys its frame table with it, so frame ids stay small
/// and lookups are O(1).
pub(crate) struct Slab<T> {
    /// Storage for items; `None` marks a vacant slot.
    items: Vec<Option<T>>,
    /// Stack of free keys that can be reused.
    free: Vec<usize>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates an empty `Slab`.
    pub(crate) const fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Inserts a value into the slab and returns its key.
    ///
    /// If a free slot is available, it is reused. Otherwise the
    /// storage grows by one slot.
    pub(crate) fn insert(&mut self, item: T) -> usize {
        let key = match self.free.pop() {
            Some(key) => key,
            None => {
                self.items.push(None);
                self.items.len() - 1
            }
        };

        self.items[key] = Some(item);
        self.len += 1;

        key
    }

    /// Returns the key the next [`insert`](Self::insert) will use.
    pub(crate) fn vacant_key(&self) -> usize {
        self.free.last().copied().unwrap_or(self.items.len())
    }

    /// Removes and returns the value stored at `key`.
    ///
    /// Returns `None` if the slot is vacant or out of range; the key
    /// is then left untouched.
    pub(crate) fn remove(&mut self, key: usize) -> Option<T> {
        let item = self.items.get_mut(key)?.take()?;

        self.free.push(key);
        self.len -= 1;

        Some(item)
    }

    /// Returns a shared reference to the value at `key`.
    pub(crate) fn get(&self, key: usize) -> Option<&T> {
        self.items.get(key)?.as_ref()
    }

    /// Returns the number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Slab;

    #[test]
    fn keys_are_reused_after_removal() {
        let mut slab = Slab::new();
        let a = slab.insert("a");
        let b = slab.insert("b");

        assert_eq!(slab.remove(a), Some("a"));
        assert_eq!(slab.vacant_key(), a);
        assert_eq!(slab.insert("c"), a);
        assert_eq!(slab.vacant_key(), 2);
        assert_eq!(slab.get(b), Some(&"b"));
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn removing_a_vacant_key_is_a_no_op() {
        let mut slab = Slab::new();
        let a = slab.insert(1);

        assert_eq!(slab.remove(a), Some(1));
        assert_eq!(slab.remove(a), None);
        assert_eq!(slab.remove(42), None);
        assert_eq!(slab.len(), 0);
    }
}
