use std::{
    fmt,
    hash::Hash,
    marker::PhantomData,
    ptr,
    sync::atomic::Ordering::{Acquire, Relaxed},
};

use crate::{
    access::{self, AccessError, Handle},
    shared::{Group, MAX_REFCOUNT},
    Null, SharedPtr,
};

/// A weak pointer observing a [`SharedPtr`] ownership group.
///
/// A `WeakPtr` keeps the group's counts alive but never the value: once the last `SharedPtr`
/// is gone the value is dropped and the weak pointer reports [`expired`][WeakPtr::expired]. To read
/// the value you must first [`lock`][WeakPtr::lock] the weak pointer into a strong pointer.
///
/// ```
/// # use std::mem::drop;
/// # use ownptr::{Null, SharedPtr, WeakPtr};
/// let s = SharedPtr::new(80);
/// let w = WeakPtr::from(&s);
///
/// assert!(!w.expired());
/// assert!(*w.lock() == 80);
///
/// drop(s);
/// assert!(w.expired());
/// assert!(w.lock() == Null);
/// ```
pub struct WeakPtr<T> {
    group: Option<Group<T>>,
    _marker: PhantomData<T>,
}

unsafe impl<T> Send for WeakPtr<T> where T: Send + Sync {}

unsafe impl<T> Sync for WeakPtr<T> where T: Send + Sync {}

impl<T> WeakPtr<T> {
    /// Creates an empty weak pointer that observes nothing. It is always expired.
    pub const fn new() -> Self {
        WeakPtr {
            group: None,
            _marker: PhantomData,
        }
    }

    /// Used by [`SharedPtr::downgrade`] once it has added a weak count on behalf of the new pointer.
    pub(crate) fn from_group(group: Group<T>) -> Self {
        WeakPtr {
            group: Some(group),
            _marker: PhantomData,
        }
    }

    /// Returns `true` if there are no more strong pointers to the value, or if this weak pointer
    /// is empty.
    pub fn expired(&self) -> bool {
        self.strong_count() == 0
    }

    /// Creates a strong pointer to the value. Returns a null [`SharedPtr`] if the value has already
    /// been dropped because there are no more strong pointers to it.
    pub fn lock(&self) -> SharedPtr<T> {
        let Some(group) = self.group else {
            return SharedPtr::null();
        };
        let strong = &group.counts().strong;

        let mut n = strong.load(Relaxed);
        loop {
            if n == 0 {
                return SharedPtr::null();
            }
            if n > MAX_REFCOUNT {
                std::process::abort();
            }

            match strong.compare_exchange_weak(n, n + 1, Acquire, Relaxed) {
                Ok(_) => break,
                Err(current) => n = current,
            }
        }

        SharedPtr::from_group(group)
    }

    /// Like [`WeakPtr::lock`], but reports why no strong pointer could be created.
    ///
    /// ```
    /// # use ownptr::{AccessError, SharedPtr, WeakPtr};
    /// let w = WeakPtr::<i32>::new();
    /// assert!(w.try_lock().unwrap_err() == AccessError::Null);
    ///
    /// let w = SharedPtr::new(1).downgrade();
    /// assert!(w.try_lock().unwrap_err() == AccessError::Expired);
    /// ```
    pub fn try_lock(&self) -> Result<SharedPtr<T>, AccessError> {
        if self.group.is_none() {
            return Err(AccessError::Null);
        }

        let strong = self.lock();
        if strong.is_null() {
            Err(AccessError::Expired)
        } else {
            Ok(strong)
        }
    }

    /// See [`SharedPtr::strong_count`]. Returns `0` once the value has been dropped.
    pub fn strong_count(&self) -> usize {
        self.group
            .map_or(0, |group| group.counts().strong.load(Acquire))
    }

    /// See [`SharedPtr::weak_count`]. Returns `0` once the value has been dropped, even while weak
    /// pointers remain.
    pub fn weak_count(&self) -> usize {
        let Some(group) = self.group else {
            return 0;
        };

        let counts = group.counts();
        let weak = counts.weak.load(Acquire);
        if counts.strong.load(Acquire) == 0 {
            0
        } else {
            weak - 1
        }
    }

    /// Returns `true` if both weak pointers observe the same ownership group, or both are empty.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.group.map(|group| group.counts) == other.group.map(|group| group.counts)
    }

    fn counts_ptr(&self) -> *const () {
        self.group
            .map_or(ptr::null(), |group| group.counts.as_ptr().cast_const().cast())
    }
}

impl<T> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        if let Some(group) = self.group.take() {
            group.release_weak();
        }
    }
}

impl<T> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        if let Some(group) = self.group {
            if group.counts().weak.fetch_add(1, Relaxed) > MAX_REFCOUNT {
                std::process::abort();
            }
        }

        WeakPtr {
            group: self.group,
            _marker: PhantomData,
        }
    }
}

impl<T> Handle for WeakPtr<T> {
    type Target = T;

    /// The observed address. It may dangle once the weak pointer has expired.
    fn as_ptr(&self) -> *const T {
        access::address(self.group.map(|group| group.value)).cast_const()
    }
}

impl<T> Default for WeakPtr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<&SharedPtr<T>> for WeakPtr<T> {
    fn from(value: &SharedPtr<T>) -> Self {
        value.downgrade()
    }
}

impl<T> PartialEq for WeakPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for WeakPtr<T> {}

impl<T> PartialEq<Null> for WeakPtr<T> {
    fn eq(&self, _: &Null) -> bool {
        self.group.is_none()
    }
}

impl<T> PartialEq<WeakPtr<T>> for Null {
    fn eq(&self, other: &WeakPtr<T>) -> bool {
        other.group.is_none()
    }
}

impl<T> Hash for WeakPtr<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Hash::hash(&self.counts_ptr(), state)
    }
}

impl<T> fmt::Debug for WeakPtr<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("WeakPtr");
        let strong = self.lock();
        if let Ok(value) = strong.try_get() {
            f.field(value);
        }
        f.finish()
    }
}
