use std::{sync::Arc, time::Duration};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A thread-safe, reference-counted resource container with read-write locking.
///
/// `MtResource` provides synchronized access to a value of type `T` that can be shared
/// across threads. It uses an `Arc<RwLock<T>>` internally to manage concurrent access.
/// Chunk block storage lives behind one of these: workers take read or write guards,
/// the main thread only ever uses the non-blocking `try_*` accessors.
///
/// # Type Parameters
/// - `T`: The type of the contained resource, must be `Send + Sync`
///
/// # Examples
///
/// ## Basic Usage
/// ```
/// use voxel_streamer::core::MtResource;
///
/// let counter = MtResource::new(0);
/// *counter.get_mut() += 1;
/// assert_eq!(*counter.get(), 1);
/// ```
///
/// ## Bounded Acquisition
/// ```
/// use std::time::Duration;
/// use voxel_streamer::core::MtResource;
///
/// let counter = MtResource::new(0);
/// let writer = counter.get_mut();
/// assert!(counter.try_get_for(Duration::from_millis(1)).is_none());
/// drop(writer);
/// assert!(counter.try_get_for(Duration::from_millis(1)).is_some());
/// ```
///
/// # Performance Considerations
/// - Read operations (`get()`) can occur concurrently
/// - Write operations (`get_mut()`) are exclusive and will block other operations
/// - The timed variants never wait longer than the given duration
pub struct MtResource<T: Send + Sync> {
    pub resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Returns a read-only guard, blocking until the lock is available.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read()
    }

    /// Returns a mutable guard, blocking until the lock is available.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write()
    }

    /// Attempts to take a read guard, giving up after `timeout`.
    ///
    /// # Returns
    /// `None` if a writer held the lock for the whole duration
    pub fn try_get_for(&self, timeout: Duration) -> Option<RwLockReadGuard<'_, T>> {
        self.resource.try_read_for(timeout)
    }

    /// Attempts to take a write guard, giving up after `timeout`.
    ///
    /// # Returns
    /// `None` if any reader or writer held the lock for the whole duration
    pub fn try_get_mut_for(&self, timeout: Duration) -> Option<RwLockWriteGuard<'_, T>> {
        self.resource.try_write_for(timeout)
    }

    /// Attempts to take a read guard without waiting at all.
    pub fn try_get(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.resource.try_read()
    }

    /// Attempts to take a write guard without waiting at all.
    pub fn try_get_mut(&self) -> Option<RwLockWriteGuard<'_, T>> {
        self.resource.try_write()
    }

    /// Whether a writer currently holds the lock.
    pub fn is_locked_exclusive(&self) -> bool {
        self.resource.is_locked_exclusive()
    }

    /// Whether both handles point at the same underlying resource.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}
