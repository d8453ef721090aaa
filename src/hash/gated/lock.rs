use core::cell::UnsafeCell;
use core::fmt::Debug;
use core::ops::{Deref, DerefMut};

use spin::RwLock;
use spin::rwlock::{RwLockReadGuard, RwLockWriteGuard};

/// A reader/writer lock whose locking discipline is picked once, at
/// construction time: either a real `spin::RwLock`, or no locking at all for
/// callers that guarantee exclusive access themselves.
///
/// Both modes share the same `read`/`write` call sites; the mode is a runtime
/// property of the value, not a type parameter of the caller.
pub struct MaybeLock<T> {
    inner: Inner<T>,
}

enum Inner<T> {
    Locked(RwLock<T>),
    Raw(UnsafeCell<T>),
}

// Safety: the Raw variant is only reachable through `new_raw`, whose contract
// moves the exclusivity obligation onto the caller. The Locked variant is an
// ordinary RwLock with the usual `T: Send (+ Sync)` requirements.
unsafe impl<T: Send> Send for MaybeLock<T> {}
unsafe impl<T: Send + Sync> Sync for MaybeLock<T> {}

impl<T> MaybeLock<T> {
    /// Create a lock in the locked (concurrency-safe) mode.
    ///
    /// Any number of concurrent readers, or exactly one writer, may hold the
    /// lock at a time.
    pub fn new(value: T) -> Self {
        Self {
            inner: Inner::Locked(RwLock::new(value)),
        }
    }

    /// Create a lock in the raw mode: `read` and `write` hand out plain
    /// references without any synchronization.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that the value is never accessed from more
    /// than one thread at a time, and that no guard is still live when a
    /// write guard is taken. Violating either rule is undefined behavior.
    pub unsafe fn new_raw(value: T) -> Self {
        Self {
            inner: Inner::Raw(UnsafeCell::new(value)),
        }
    }

    /// Check whether the lock is in the locked (concurrency-safe) mode.
    pub fn is_locked(&self) -> bool {
        matches!(self.inner, Inner::Locked(_))
    }

    /// Check whether the lock is in the raw (unsynchronized) mode.
    pub fn is_raw(&self) -> bool {
        matches!(self.inner, Inner::Raw(_))
    }

    /// Acquire shared access. Blocks while a writer holds the lock; a no-op
    /// in raw mode.
    ///
    /// # Returns
    /// A guard dereferencing to the protected value; shared access is held
    /// until the guard is dropped.
    pub fn read(&self) -> MaybeReadGuard<'_, T> {
        match &self.inner {
            Inner::Locked(lock) => MaybeReadGuard {
                inner: ReadInner::Locked(lock.read()),
            },
            // Safety: upheld by the `new_raw` contract.
            Inner::Raw(cell) => MaybeReadGuard {
                inner: ReadInner::Raw(unsafe { &*cell.get() }),
            },
        }
    }

    /// Acquire exclusive access. Blocks while any reader or writer holds the
    /// lock; a no-op in raw mode.
    ///
    /// # Returns
    /// A guard dereferencing mutably to the protected value; exclusive access
    /// is held until the guard is dropped.
    pub fn write(&self) -> MaybeWriteGuard<'_, T> {
        match &self.inner {
            Inner::Locked(lock) => MaybeWriteGuard {
                inner: WriteInner::Locked(lock.write()),
            },
            // Safety: upheld by the `new_raw` contract.
            Inner::Raw(cell) => MaybeWriteGuard {
                inner: WriteInner::Raw(unsafe { &mut *cell.get() }),
            },
        }
    }

    /// Consume the lock and return the protected value.
    pub fn into_inner(self) -> T {
        match self.inner {
            Inner::Locked(lock) => lock.into_inner(),
            Inner::Raw(cell) => cell.into_inner(),
        }
    }
}

impl<T> Debug for MaybeLock<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.inner {
            Inner::Locked(_) => write!(f, "MaybeLock::Locked(..)"),
            Inner::Raw(_) => write!(f, "MaybeLock::Raw(..)"),
        }
    }
}

/// Shared-access guard returned by [`MaybeLock::read`].
pub struct MaybeReadGuard<'a, T> {
    inner: ReadInner<'a, T>,
}

enum ReadInner<'a, T> {
    Locked(RwLockReadGuard<'a, T>),
    Raw(&'a T),
}

impl<'a, T> Deref for MaybeReadGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match &self.inner {
            ReadInner::Locked(guard) => guard,
            ReadInner::Raw(value) => value,
        }
    }
}

/// Exclusive-access guard returned by [`MaybeLock::write`].
pub struct MaybeWriteGuard<'a, T> {
    inner: WriteInner<'a, T>,
}

enum WriteInner<'a, T> {
    Locked(RwLockWriteGuard<'a, T>),
    Raw(&'a mut T),
}

impl<'a, T> Deref for MaybeWriteGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match &self.inner {
            WriteInner::Locked(guard) => guard,
            WriteInner::Raw(value) => value,
        }
    }
}

impl<'a, T> DerefMut for MaybeWriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.inner {
            WriteInner::Locked(guard) => guard,
            WriteInner::Raw(value) => value,
        }
    }
}
