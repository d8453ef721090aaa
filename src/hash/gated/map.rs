use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::{BuildHasher, Hash};
use core::ptr;

use crossbeam_utils::CachePadded;
use hashbrown::hash_map::Entry;
use hashbrown::{DefaultHashBuilder, HashMap};

use super::lock::MaybeLock;

/// A hash map gated behind a [`MaybeLock`]: concurrency-safe by default,
/// optionally unsynchronized for single-threaded callers.
///
/// Every operation takes one lock/unlock cycle of the minimal mode it needs
/// (shared for reads, exclusive for writes). The compound operations
/// ([`get_or_insert`](Self::get_or_insert) and friends) re-check presence
/// under the exclusive lock, so two racing callers can never both initialize
/// the same key.
///
/// ```
/// use gated_collections::hash::gated::GatedMap;
///
/// let map = GatedMap::new();
/// assert_eq!(map.get_or_insert("port", 8080), 8080);
/// assert_eq!(map.get_or_insert("port", 9090), 8080);
/// ```
pub struct GatedMap<K, V, S = DefaultHashBuilder> {
    data: CachePadded<MaybeLock<HashMap<K, V, S>>>,
}

impl<K, V> GatedMap<K, V>
where
    K: Eq + Hash,
{
    /// Create an empty map in the locked (concurrency-safe) mode.
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    /// Create an empty locked-mode map with at least the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_map(HashMap::with_capacity(capacity))
    }

    /// Create an empty map in the raw mode: no internal synchronization.
    ///
    /// # Safety
    ///
    /// The caller must guarantee the map is never used from more than one
    /// thread at a time (or is externally synchronized), including the
    /// callback operations. See [`MaybeLock::new_raw`].
    pub unsafe fn new_unsync() -> Self {
        unsafe { Self::from_map_unsync(HashMap::new()) }
    }
}

impl<K, V> GatedMap<K, Option<V>>
where
    K: Eq + Hash,
{
    /// Build a locked-mode map by zipping `keys` with `values`.
    ///
    /// Keys beyond the end of `values` are still inserted, mapped to `None`,
    /// so "present without a value" stays distinguishable from "missing".
    /// Surplus values are dropped.
    ///
    /// ```
    /// use gated_collections::hash::gated::GatedMap;
    ///
    /// let map = GatedMap::from_sequences([1, 2, 3], [10, 20]);
    /// assert_eq!(map.get(&2), Some(Some(20)));
    /// assert_eq!(map.get(&3), Some(None));
    /// assert_eq!(map.get(&4), None);
    /// ```
    pub fn from_sequences<I, J>(keys: I, values: J) -> Self
    where
        I: IntoIterator<Item = K>,
        J: IntoIterator<Item = V>,
    {
        Self::from_map(zip_padded(keys, values))
    }

    /// Raw-mode counterpart of [`from_sequences`](Self::from_sequences).
    ///
    /// # Safety
    ///
    /// Same contract as [`GatedMap::new_unsync`].
    pub unsafe fn from_sequences_unsync<I, J>(keys: I, values: J) -> Self
    where
        I: IntoIterator<Item = K>,
        J: IntoIterator<Item = V>,
    {
        unsafe { Self::from_map_unsync(zip_padded(keys, values)) }
    }
}

fn zip_padded<K, V, S, I, J>(keys: I, values: J) -> HashMap<K, Option<V>, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    I: IntoIterator<Item = K>,
    J: IntoIterator<Item = V>,
{
    let mut values = values.into_iter();
    keys.into_iter().map(|key| (key, values.next())).collect()
}

impl<K, V, S> GatedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Adopt an existing map as the backing store, in the locked mode.
    ///
    /// The store is moved in, so no other handle to it can remain outside.
    pub fn from_map(map: HashMap<K, V, S>) -> Self {
        Self {
            data: CachePadded::new(MaybeLock::new(map)),
        }
    }

    /// Raw-mode counterpart of [`from_map`](Self::from_map).
    ///
    /// # Safety
    ///
    /// Same contract as [`GatedMap::new_unsync`].
    pub unsafe fn from_map_unsync(map: HashMap<K, V, S>) -> Self {
        Self {
            data: CachePadded::new(unsafe { MaybeLock::new_raw(map) }),
        }
    }

    /// Insert a key-value pair.
    ///
    /// # Returns
    /// The previous value associated with the key, if any.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.data.write().insert(key, value)
    }

    /// Insert every pair of `entries` under a single exclusive lock. Other
    /// readers and writers observe either none or all of the batch.
    pub fn insert_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut store = self.data.write();
        for (key, value) in entries {
            store.insert(key, value);
        }
    }

    /// Get a clone of the value for `key`, or `None` if the key is absent.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq + Hash,
        V: Clone,
    {
        self.data.read().get(key).cloned()
    }

    /// Read an entry under the shared lock and compute a result with `f`,
    /// without cloning the value.
    ///
    /// The closure runs while the lock is held and must not call back into
    /// this map.
    ///
    /// # Returns
    /// * `Some(R)` - the closure's result, if the key exists
    /// * `None` - if the key does not exist
    pub fn view<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq + Hash,
        F: FnOnce(&K, &V) -> R,
    {
        let store = self.data.read();
        store.get_key_value(key).map(|(k, v)| f(k, v))
    }

    /// Remove `key` and return the value it had, atomically with the
    /// deletion.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq + Hash,
    {
        self.data.write().remove(key)
    }

    /// Remove every key of `keys` under a single exclusive lock.
    pub fn remove_all<'a, Q, I>(&self, keys: I)
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq + Hash + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        let mut store = self.data.write();
        for key in keys {
            store.remove(key);
        }
    }

    /// Check whether a key exists.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq + Hash,
    {
        self.data.read().contains_key(key)
    }

    /// Get the number of entries in the map.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Get all keys as a freshly allocated vector, in unspecified order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.data.read().keys().cloned().collect()
    }

    /// Get all values as a freshly allocated vector, in unspecified order.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.data.read().values().cloned().collect()
    }

    /// Get an independent copy of the backing store, taken under one
    /// shared-lock cycle. The copy is safe to retain and mutate.
    pub fn snapshot(&self) -> HashMap<K, V, S>
    where
        K: Clone,
        V: Clone,
        S: Clone,
    {
        self.data.read().clone()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.data.write().clear();
    }

    /// Iterate the map with `f` under the shared lock, in unspecified order,
    /// stopping as soon as `f` returns `false`.
    ///
    /// The lock is held for the whole traversal: `f` must not call back into
    /// this map and should complete quickly, as it blocks all writers.
    pub fn iterate<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let store = self.data.read();
        for (key, value) in store.iter() {
            if !f(key, value) {
                break;
            }
        }
    }

    /// Copy every entry of `other` into `self`, overwriting on key
    /// collision. Merging a map into itself is a no-op.
    ///
    /// Takes the exclusive lock on `self` and the shared lock on `other`;
    /// both are acquired in address order, so two merges running in opposite
    /// directions cannot deadlock.
    pub fn merge(&self, other: &Self)
    where
        K: Clone,
        V: Clone,
    {
        if ptr::eq(self, other) {
            return;
        }
        let mut dst;
        let src;
        if (self as *const Self) < (other as *const Self) {
            dst = self.data.write();
            src = other.data.read();
        } else {
            src = other.data.read();
            dst = self.data.write();
        }
        for (key, value) in src.iter() {
            dst.insert(key.clone(), value.clone());
        }
    }

    /// Get the value for `key`, inserting `value` first if the key is
    /// absent.
    ///
    /// Presence is checked twice: once under the shared lock (the cheap
    /// path), and again under the exclusive lock before inserting, so of any
    /// number of racing callers exactly one stores its value and all of them
    /// return that one stored value.
    pub fn get_or_insert(&self, key: K, value: V) -> V
    where
        V: Clone,
    {
        match self.get(&key) {
            Some(existing) => existing,
            None => self.check_and_insert(key, value),
        }
    }

    /// Get the value for `key`, inserting the supplier's result first if the
    /// key is absent.
    ///
    /// The supplier runs at most once per call and never under the exclusive
    /// lock: racing callers may each run their supplier, and every result
    /// except the winner's is discarded by the re-check. Use
    /// [`get_or_insert_with_locked`](Self::get_or_insert_with_locked) when
    /// the supplier must run at most once globally.
    pub fn get_or_insert_with<F>(&self, key: K, supplier: F) -> V
    where
        V: Clone,
        F: FnOnce() -> V,
    {
        match self.get(&key) {
            Some(existing) => existing,
            None => {
                let value = supplier();
                self.check_and_insert(key, value)
            }
        }
    }

    /// Get the value for `key`, inserting the supplier's result first if the
    /// key is absent. The supplier executes while the exclusive lock is
    /// held, and only when the key is still absent after the re-check, so
    /// across any set of racing callers it runs exactly once.
    ///
    /// The lock is held for the duration of the supplier: it must not call
    /// back into this map.
    pub fn get_or_insert_with_locked<F>(&self, key: K, supplier: F) -> V
    where
        V: Clone,
        F: FnOnce() -> V,
    {
        match self.get(&key) {
            Some(existing) => existing,
            None => self.check_and_insert_with(key, supplier),
        }
    }

    /// Insert `value` only if `key` is absent.
    ///
    /// # Returns
    /// Whether the insert actually happened; `false` means the key
    /// pre-existed (possibly via a racing writer) and `value` was discarded.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        if self.contains_key(&key) {
            return false;
        }
        self.try_insert_absent(key, value)
    }

    /// Insert the supplier's result only if `key` is absent. The supplier
    /// runs outside the exclusive lock; its result is discarded if a racing
    /// writer got there first.
    ///
    /// # Returns
    /// Whether the insert actually happened.
    pub fn insert_if_absent_with<F>(&self, key: K, supplier: F) -> bool
    where
        F: FnOnce() -> V,
    {
        if self.contains_key(&key) {
            return false;
        }
        let value = supplier();
        self.try_insert_absent(key, value)
    }

    /// Insert the supplier's result only if `key` is absent, running the
    /// supplier under the exclusive lock and only after the re-check found
    /// the key still absent. The supplier must not call back into this map.
    ///
    /// # Returns
    /// Whether the insert actually happened.
    pub fn insert_if_absent_with_locked<F>(&self, key: K, supplier: F) -> bool
    where
        F: FnOnce() -> V,
    {
        if self.contains_key(&key) {
            return false;
        }
        self.try_insert_absent_with(key, supplier)
    }

    /// Run `f` with shared access to the live backing store, releasing the
    /// lock when it returns (also on panic).
    ///
    /// This is the sanctioned way to run multi-step custom reads. `f` must
    /// not call back into any locking operation of this map.
    pub fn read_with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&HashMap<K, V, S>) -> R,
    {
        f(&self.data.read())
    }

    /// Run `f` with exclusive access to the live backing store, releasing
    /// the lock when it returns (also on panic). The whole callback is one
    /// atomic write transaction.
    ///
    /// `f` must not call back into any locking operation of this map; the
    /// exclusive lock is not reentrant.
    pub fn write_with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut HashMap<K, V, S>) -> R,
    {
        f(&mut self.data.write())
    }

    /// Consume the map and return the backing store.
    pub fn into_map(self) -> HashMap<K, V, S> {
        self.data.into_inner().into_inner()
    }

    // Re-check presence under the exclusive lock; insert only if the key is
    // still vacant. Returns the value that ended up stored.
    fn check_and_insert(&self, key: K, value: V) -> V
    where
        V: Clone,
    {
        let mut store = self.data.write();
        match store.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => entry.insert(value).clone(),
        }
    }

    // Like `check_and_insert`, but the supplier only runs if the re-check
    // finds the key vacant, while the exclusive lock is held.
    fn check_and_insert_with<F>(&self, key: K, supplier: F) -> V
    where
        V: Clone,
        F: FnOnce() -> V,
    {
        let mut store = self.data.write();
        match store.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => entry.insert(supplier()).clone(),
        }
    }

    fn try_insert_absent(&self, key: K, value: V) -> bool {
        let mut store = self.data.write();
        match store.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    fn try_insert_absent_with<F>(&self, key: K, supplier: F) -> bool
    where
        F: FnOnce() -> V,
    {
        let mut store = self.data.write();
        match store.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(supplier());
                true
            }
        }
    }
}

impl<K, S> GatedMap<K, K, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    /// Exchange keys and values in place: the store is rebuilt mapping each
    /// value to its former key, under one exclusive lock.
    ///
    /// If several entries share a value, exactly one of their keys survives
    /// (which one is unspecified), so the operation is lossy on duplicate
    /// values and does not round-trip for them.
    pub fn invert(&self) {
        let mut store = self.data.write();
        let inverted: HashMap<K, K, S> = store.drain().map(|(key, value)| (value, key)).collect();
        *store = inverted;
    }
}

impl<K, V, S> Default for GatedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::from_map(HashMap::default())
    }
}

impl<K, V, S> Clone for GatedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Copy the entries under one shared-lock cycle. The clone is always in
    /// the locked mode, whatever the mode of `self`.
    fn clone(&self) -> Self {
        Self::from_map(self.data.read().clone())
    }
}

impl<K, V, S> Debug for GatedMap<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let store = self.data.read();
        f.debug_map().entries(store.iter()).finish()
    }
}
