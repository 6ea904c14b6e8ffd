//! Refcounted cache of loaded resources.
//!
//! Slots live in an arena whose first two entries anchor two rings: the
//! `loaded` list, kept in most-recently-used order, and the `free` list of
//! cleared slots whose arena entry is kept for reuse. Ring links are arena
//! indices, so promoting a hit or recycling a slot is O(1) and allocation
//! free. A slot moves `loaded -> free` when the last [`Resource`] handle to
//! it drops, and `free -> loaded` when a cache miss recycles it.

use std::cell::RefCell;
use std::rc::Rc;

use super::error::SldError;

/// Arena index of the loaded-list sentinel.
const LOADED: usize = 0;
/// Arena index of the free-list sentinel.
const FREE: usize = 1;

#[derive(Debug, Default)]
struct Slot {
    refcnt: u32,
    res_type: u32,
    index: u32,
    /// Resource bytes; `None` while the slot sits on the free list.
    data: Option<Rc<[u8]>>,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
pub(crate) struct ResourceCache {
    slots: Vec<Slot>,
}

impl ResourceCache {
    pub fn new() -> ResourceCache {
        ResourceCache {
            slots: vec![
                Slot { prev: LOADED, next: LOADED, ..Slot::default() },
                Slot { prev: FREE, next: FREE, ..Slot::default() },
            ],
        }
    }

    fn unlink(&mut self, i: usize) {
        let (prev, next) = (self.slots[i].prev, self.slots[i].next);
        self.slots[prev].next = next;
        self.slots[next].prev = prev;
        self.slots[i].prev = i;
        self.slots[i].next = i;
    }

    fn push_front(&mut self, head: usize, i: usize) {
        let first = self.slots[head].next;
        self.slots[i].prev = head;
        self.slots[i].next = first;
        self.slots[first].prev = i;
        self.slots[head].next = i;
    }

    fn pop_front(&mut self, head: usize) -> Option<usize> {
        let first = self.slots[head].next;
        if first == head {
            return None;
        }
        self.unlink(first);
        Some(first)
    }

    /// Looks for a loaded slot with the given key. On a hit the slot gains a
    /// reference and moves to the head of the loaded list.
    pub fn find_loaded(&mut self, res_type: u32, index: u32) -> Option<(usize, Rc<[u8]>)> {
        let mut i = self.slots[LOADED].next;
        while i != LOADED {
            if self.slots[i].res_type == res_type && self.slots[i].index == index {
                let data = self.slots[i].data.clone()?;
                self.slots[i].refcnt += 1;
                self.unlink(i);
                self.push_front(LOADED, i);
                return Some((i, data));
            }
            i = self.slots[i].next;
        }
        None
    }

    /// Fills a slot with freshly loaded data and inserts it at the head of
    /// the loaded list, reusing a free slot when one is available. The new
    /// slot starts with one reference.
    pub fn insert(&mut self, res_type: u32, index: u32, data: Rc<[u8]>) -> usize {
        let i = match self.pop_front(FREE) {
            Some(i) => i,
            None => {
                let i = self.slots.len();
                self.slots.push(Slot { prev: i, next: i, ..Slot::default() });
                i
            }
        };

        let slot = &mut self.slots[i];
        slot.refcnt = 1;
        slot.res_type = res_type;
        slot.index = index;
        slot.data = Some(data);
        self.push_front(LOADED, i);
        i
    }

    /// Moves a slot whose refcount reached zero to the head of the free
    /// list, dropping its data. The arena entry survives for reuse.
    fn release(&mut self, i: usize) {
        self.unlink(i);
        self.push_front(FREE, i);
        let slot = &mut self.slots[i];
        slot.refcnt = 0;
        slot.res_type = 0;
        slot.index = 0;
        slot.data = None;
    }

    /// Clears every loaded slot onto the free list.
    pub fn clear(&mut self) {
        loop {
            let first = self.slots[LOADED].next;
            if first == LOADED {
                break;
            }
            self.release(first);
        }
    }
}

#[cfg(test)]
impl ResourceCache {
    pub fn loaded_keys(&self) -> Vec<(u32, u32)> {
        let mut keys = Vec::new();
        let mut i = self.slots[LOADED].next;
        while i != LOADED {
            keys.push((self.slots[i].res_type, self.slots[i].index));
            i = self.slots[i].next;
        }
        keys
    }

    pub fn free_len(&self) -> usize {
        let mut n = 0;
        let mut i = self.slots[FREE].next;
        while i != FREE {
            n += 1;
            i = self.slots[i].next;
        }
        n
    }

    pub fn slot_len(&self) -> usize {
        self.slots.len() - 2
    }

    pub fn refcnt(&self, res_type: u32, index: u32) -> Option<u32> {
        let mut i = self.slots[LOADED].next;
        while i != LOADED {
            if self.slots[i].res_type == res_type && self.slots[i].index == index {
                return Some(self.slots[i].refcnt);
            }
            i = self.slots[i].next;
        }
        None
    }
}

/// A refcounted handle to a resource held in the reader's cache.
///
/// Cloning bumps the cache slot's refcount; when the last handle drops, the
/// slot moves to the free list and its data is released. A handle that
/// outlives the slot (the reader was closed, or the slot was recycled) keeps
/// its own reference to the data and simply stops touching the cache.
#[derive(Debug)]
pub struct Resource {
    cache: Rc<RefCell<ResourceCache>>,
    slot: usize,
    data: Rc<[u8]>,
    res_type: u32,
    index: u32,
}

impl Resource {
    pub(crate) fn new(
        cache: Rc<RefCell<ResourceCache>>,
        slot: usize,
        data: Rc<[u8]>,
        res_type: u32,
        index: u32,
    ) -> Resource {
        Resource { cache, slot, data, res_type, index }
    }

    /// Whether the cache slot still belongs to this handle.
    fn still_cached(&self, cache: &ResourceCache) -> bool {
        cache.slots.get(self.slot).is_some_and(|s| {
            s.refcnt > 0 && s.data.as_ref().is_some_and(|d| Rc::ptr_eq(d, &self.data))
        })
    }

    /// The resource bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size of the resource data in bytes.
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    /// Resource type.
    pub fn res_type(&self) -> u32 {
        self.res_type
    }

    /// Resource number among resources of the same type.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl Clone for Resource {
    fn clone(&self) -> Resource {
        {
            let mut cache = self.cache.borrow_mut();
            if self.still_cached(&cache) {
                cache.slots[self.slot].refcnt += 1;
            }
        }
        Resource {
            cache: Rc::clone(&self.cache),
            slot: self.slot,
            data: Rc::clone(&self.data),
            res_type: self.res_type,
            index: self.index,
        }
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        let mut cache = self.cache.borrow_mut();
        if self.still_cached(&cache) {
            cache.slots[self.slot].refcnt -= 1;
            if cache.slots[self.slot].refcnt == 0 {
                cache.release(self.slot);
            }
        }
    }
}

/// Outcome of a [`SdcReader::get_resource`] call: a live handle, or the
/// error that kept the resource from loading.
///
/// [`SdcReader::get_resource`]: super::SdcReader::get_resource
pub type ResourceHandle = Result<Resource, SldError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn data(bytes: &[u8]) -> Rc<[u8]> {
        Rc::from(bytes)
    }

    #[test]
    fn test_insert_and_find() {
        let mut cache = ResourceCache::new();
        cache.insert(7, 3, data(b"abcd"));
        cache.insert(9, 4, data(b"ef"));

        assert_eq!(cache.loaded_keys(), vec![(9, 4), (7, 3)]);

        // a hit gains a reference and moves to the MRU head
        let (slot, bytes) = cache.find_loaded(7, 3).unwrap();
        assert_eq!(&bytes[..], b"abcd");
        assert_eq!(cache.loaded_keys(), vec![(7, 3), (9, 4)]);
        assert_eq!(cache.slots[slot].refcnt, 2);

        assert!(cache.find_loaded(7, 0).is_none());
    }

    #[test]
    fn test_release_recycles_slot() {
        let mut cache = ResourceCache::new();
        let first = cache.insert(7, 3, data(b"abcd"));
        cache.release(first);

        assert_eq!(cache.loaded_keys(), vec![]);
        assert_eq!(cache.free_len(), 1);
        assert!(cache.slots[first].data.is_none());

        // the next insert reuses the freed slot instead of growing the arena
        let second = cache.insert(9, 4, data(b"ef"));
        assert_eq!(second, first);
        assert_eq!(cache.slot_len(), 1);
        assert_eq!(cache.free_len(), 0);
    }

    #[test]
    fn test_clear_moves_all_to_free() {
        let mut cache = ResourceCache::new();
        cache.insert(1, 0, data(b"a"));
        cache.insert(2, 0, data(b"b"));
        cache.insert(3, 0, data(b"c"));

        cache.clear();
        assert_eq!(cache.loaded_keys(), vec![]);
        assert_eq!(cache.free_len(), 3);
        assert_eq!(cache.slot_len(), 3);
    }

    #[test]
    fn test_handle_refcounting() {
        let cache = Rc::new(RefCell::new(ResourceCache::new()));
        let bytes: Rc<[u8]> = data(b"abcd");
        let slot = cache.borrow_mut().insert(7, 3, Rc::clone(&bytes));
        let handle = Resource::new(Rc::clone(&cache), slot, bytes, 7, 3);

        let copies = vec![handle.clone(), handle.clone(), handle.clone()];
        assert_eq!(cache.borrow().refcnt(7, 3), Some(4));

        drop(copies);
        assert_eq!(cache.borrow().refcnt(7, 3), Some(1));
        assert_eq!(handle.data(), b"abcd");
        assert_eq!((handle.res_type(), handle.index(), handle.size()), (7, 3, 4));

        // the last drop releases the slot exactly once
        drop(handle);
        assert_eq!(cache.borrow().refcnt(7, 3), None);
        assert_eq!(cache.borrow().free_len(), 1);
        assert_eq!(cache.borrow().slot_len(), 1);
    }

    #[test]
    fn test_handle_survives_clear() {
        let cache = Rc::new(RefCell::new(ResourceCache::new()));
        let bytes: Rc<[u8]> = data(b"abcd");
        let slot = cache.borrow_mut().insert(7, 3, Rc::clone(&bytes));
        let handle = Resource::new(Rc::clone(&cache), slot, bytes, 7, 3);

        cache.borrow_mut().clear();

        // the handle keeps its data and no longer touches the cache
        assert_eq!(handle.data(), b"abcd");
        let copy = handle.clone();
        assert_eq!(copy.size(), 4);
        drop(copy);
        drop(handle);
        assert_eq!(cache.borrow().free_len(), 1);
    }

    #[test]
    fn test_stale_handle_ignores_recycled_slot() {
        let cache = Rc::new(RefCell::new(ResourceCache::new()));
        let bytes: Rc<[u8]> = data(b"abcd");
        let slot = cache.borrow_mut().insert(7, 3, Rc::clone(&bytes));
        let stale = Resource::new(Rc::clone(&cache), slot, bytes, 7, 3);

        cache.borrow_mut().clear();
        let reused = cache.borrow_mut().insert(9, 4, data(b"ef"));
        assert_eq!(reused, slot);

        // dropping the stale handle must not disturb the recycled slot
        drop(stale);
        assert_eq!(cache.borrow().refcnt(9, 4), Some(1));
        assert_eq!(cache.borrow().loaded_keys(), vec![(9, 4)]);
    }
}
