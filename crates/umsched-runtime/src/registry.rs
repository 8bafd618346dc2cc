//! Delete-safe id registry
//!
//! Shared index of live runtime objects (lists, elements, schedulers).
//! Lookups hand out read guards pinning the entry; removal tombstones
//! the payload under the entry write lock, so it blocks until every
//! outstanding guard is dropped and no reader ever sees freed state.
//!
//! Two lock levels:
//! - `index`: the id -> entry map, held briefly for lookup/insert/unlink
//! - per-entry `payload` RwLock: held for the duration of reads
//!
//! A removed id distinguishes two cases: `NotFound` (never registered or
//! fully unlinked) and `Gone` (caller raced with an in-progress removal).

use std::collections::hash_map::{Entry as MapEntry, HashMap};
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use umsched_core::{UmsError, UmsResult};

struct Entry<T> {
    /// None marks a tombstone: removal won the entry, id not yet unlinked
    payload: RwLock<Option<T>>,
}

/// Registry of live objects keyed by id
pub struct IdRegistry<K, T> {
    index: RwLock<HashMap<K, Arc<Entry<T>>>>,
}

impl<K, T> IdRegistry<K, T>
where
    K: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new object under `id`
    ///
    /// Fails with `AlreadyRegistered` if the id is taken, including by an
    /// entry whose removal has not finished unlinking yet.
    pub fn add(&self, id: K, value: T) -> UmsResult<()> {
        let mut index = self.index.write().unwrap();
        match index.entry(id) {
            MapEntry::Occupied(_) => Err(UmsError::AlreadyRegistered),
            MapEntry::Vacant(slot) => {
                slot.insert(Arc::new(Entry {
                    payload: RwLock::new(Some(value)),
                }));
                Ok(())
            }
        }
    }

    /// Look up `id` and pin the entry for reading
    ///
    /// The returned guard keeps removal blocked until dropped. Returns
    /// `NotFound` for an unknown id and `Gone` for one that lost a race
    /// with removal.
    pub fn find(&self, id: K) -> UmsResult<EntryGuard<T>> {
        let entry = {
            let index = self.index.read().unwrap();
            match index.get(&id) {
                Some(e) => Arc::clone(e),
                None => return Err(UmsError::NotFound),
            }
        };

        let guard = entry.payload.read().unwrap();
        if guard.is_none() {
            return Err(UmsError::Gone);
        }

        // Safety: the guard borrows the RwLock inside `entry`, which the
        // EntryGuard keeps alive via its Arc. Field order drops the lock
        // guard before the Arc.
        let guard = unsafe {
            std::mem::transmute::<RwLockReadGuard<'_, Option<T>>, RwLockReadGuard<'static, Option<T>>>(
                guard,
            )
        };

        Ok(EntryGuard {
            guard,
            _entry: entry,
        })
    }

    /// Run `f` with exclusive access to the payload of `id`
    ///
    /// Blocks until concurrent readers drop their guards.
    pub fn with_write<R>(&self, id: K, f: impl FnOnce(&mut T) -> R) -> UmsResult<R> {
        let entry = {
            let index = self.index.read().unwrap();
            match index.get(&id) {
                Some(e) => Arc::clone(e),
                None => return Err(UmsError::NotFound),
            }
        };

        let mut guard = entry.payload.write().unwrap();
        match guard.as_mut() {
            Some(value) => Ok(f(value)),
            None => Err(UmsError::Gone),
        }
    }

    /// Remove `id` and return its payload
    ///
    /// Blocks until all outstanding read guards on the entry drop. Exactly
    /// one concurrent remover gets the payload; the others see `Gone` (or
    /// `NotFound` once the id is unlinked).
    pub fn remove(&self, id: K) -> UmsResult<T> {
        let entry = {
            let index = self.index.read().unwrap();
            match index.get(&id) {
                Some(e) => Arc::clone(e),
                None => return Err(UmsError::NotFound),
            }
        };

        // Tombstone first so racing finds report Gone, then unlink
        let taken = entry.payload.write().unwrap().take();
        let value = match taken {
            Some(v) => v,
            None => return Err(UmsError::Gone),
        };

        let mut index = self.index.write().unwrap();
        if let Some(current) = index.get(&id) {
            if Arc::ptr_eq(current, &entry) {
                index.remove(&id);
            }
        }
        Ok(value)
    }

    /// Whether `id` refers to a live (not tombstoned) entry
    pub fn contains(&self, id: K) -> bool {
        let entry = {
            let index = self.index.read().unwrap();
            match index.get(&id) {
                Some(e) => Arc::clone(e),
                None => return false,
            }
        };
        let live = entry.payload.read().unwrap().is_some();
        live
    }

    /// Snapshot of currently registered ids
    pub fn ids(&self) -> Vec<K> {
        self.index.read().unwrap().keys().copied().collect()
    }

    /// Number of registered ids (tombstones included until unlinked)
    pub fn len(&self) -> usize {
        self.index.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, T> Default for IdRegistry<K, T>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Read guard pinning one registry entry
///
/// Dereferences to the payload. Removal of the entry blocks while any
/// guard is alive, so the payload stays valid for the guard's lifetime.
pub struct EntryGuard<T: 'static> {
    // Declared before the Arc so it drops first
    guard: RwLockReadGuard<'static, Option<T>>,
    _entry: Arc<Entry<T>>,
}

impl<T> std::ops::Deref for EntryGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Some for as long as any read guard lives
        self.guard.as_ref().unwrap()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for EntryGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EntryGuard").field(&**self).finish()
    }
}
