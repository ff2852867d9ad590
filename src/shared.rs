use std::{
    fmt,
    marker::PhantomData,
    mem,
    ptr::NonNull,
    sync::atomic::fence,
    sync::atomic::AtomicUsize,
    sync::atomic::Ordering::{Acquire, Relaxed, Release},
};

use log::trace;

use crate::{
    access::{self, impl_address_ops, AccessError, Handle},
    UniquePtr, WeakPtr,
};

/// Counts above this are treated as a leak of handles and abort the process, like [`Arc`] does.
///
/// [`Arc`]: std::sync::Arc
pub(crate) const MAX_REFCOUNT: usize = isize::MAX as usize;

/// The bookkeeping block shared by an ownership group. It is allocated separately from the value
/// so that any boxed value can be adopted.
pub(crate) struct Counts {
    /// Number of `SharedPtr`s in the group.
    pub(crate) strong: AtomicUsize,
    /// Number of `WeakPtr`s, plus one held collectively by the strong owners while any remain.
    pub(crate) weak: AtomicUsize,
}

/// The addresses that identify an ownership group.
pub(crate) struct Group<T> {
    pub(crate) value: NonNull<T>,
    pub(crate) counts: NonNull<Counts>,
}

impl<T> Clone for Group<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Group<T> {}

impl<T> Group<T> {
    pub(crate) fn counts(&self) -> &Counts {
        // SAFETY: every `SharedPtr` and `WeakPtr` holding a group keeps the counts alive.
        unsafe { self.counts.as_ref() }
    }

    /// Gives up one weak slot and frees the counts if it was the last one.
    pub(crate) fn release_weak(self) {
        if self.counts().weak.fetch_sub(1, Release) == 1 {
            fence(Acquire);
            trace!("SharedPtr: freeing counts {:p}", self.counts);
            drop(unsafe { Box::from_raw(self.counts.as_ptr()) });
        }
    }
}

/// A reference counted pointer, similar to [`Arc`] but nullable and able to adopt an existing
/// [`Box`].
///
/// Cloning adds an owner to the ownership group. The value is dropped when the last owner goes away,
/// and [`WeakPtr`]s observing the group never keep it alive.
///
/// ```
/// # use ownptr::SharedPtr;
/// let s1 = SharedPtr::new(60);
/// let mut s2 = s1.clone();
/// assert!(s1 == s2);
/// assert!(s1.strong_count() == 2);
///
/// s2.reset(Some(Box::new(70)));
/// assert!(*s1 == 60);
/// assert!(*s2 == 70);
/// assert!(s1.strong_count() == 1);
/// ```
///
/// [`Arc`]: std::sync::Arc
pub struct SharedPtr<T> {
    group: Option<Group<T>>,
    _marker: PhantomData<T>,
}

unsafe impl<T> Send for SharedPtr<T> where T: Send + Sync {}

unsafe impl<T> Sync for SharedPtr<T> where T: Send + Sync {}

impl<T> SharedPtr<T> {
    pub const fn null() -> Self {
        SharedPtr {
            group: None,
            _marker: PhantomData,
        }
    }

    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Starts a new ownership group for `value`.
    pub fn from_box(value: Box<T>) -> Self {
        let counts = Box::new(Counts {
            strong: AtomicUsize::new(1),
            weak: AtomicUsize::new(1),
        });

        SharedPtr {
            group: Some(Group {
                value: NonNull::from(Box::leak(value)),
                counts: NonNull::from(Box::leak(counts)),
            }),
            _marker: PhantomData,
        }
    }

    /// Starts a new ownership group for an address obtained from [`Box::into_raw`]. A null `ptr`
    /// gives a null pointer without allocating counts.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from `Box::into_raw` and must not be owned by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            Some(ptr) => Self::from_box(Box::from_raw(ptr.as_ptr())),
            None => Self::null(),
        }
    }

    /// Used by [`WeakPtr::lock`] once it has added a strong count on behalf of the new pointer.
    pub(crate) fn from_group(group: Group<T>) -> Self {
        SharedPtr {
            group: Some(group),
            _marker: PhantomData,
        }
    }

    /// Gets the address without validating it.
    pub fn get(&self) -> *const T {
        access::address(self.group.map(|group| group.value)).cast_const()
    }

    pub fn try_get(&self) -> Result<&T, AccessError> {
        // SAFETY: the value lives as long as any strong owner, and `self` is one.
        access::check(self.group.map(|group| group.value)).map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Leaves the current ownership group and starts a new one for `value`.
    pub fn reset(&mut self, value: Option<Box<T>>) {
        let new = match value {
            Some(value) => Self::from_box(value),
            None => Self::null(),
        };
        drop(mem::replace(self, new));
    }

    /// Like [`SharedPtr::reset`], but a no-op when `ptr` is the held address, so the ownership group
    /// is neither released nor recreated.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must either be the held address or come from `Box::into_raw` and not be
    /// owned by anything else.
    pub unsafe fn reset_raw(&mut self, ptr: *mut T) {
        if self.get() != ptr.cast_const() {
            drop(mem::replace(self, Self::from_raw(ptr)));
        }
    }

    /// Moves this owner into the returned pointer and leaves `self` null. The strong count does not
    /// change.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Creates a new weak pointer observing this ownership group. A null pointer gives an empty
    /// weak pointer.
    ///
    /// ```
    /// # use std::mem::drop;
    /// # use ownptr::SharedPtr;
    /// let s = SharedPtr::new(5);
    /// let w = s.downgrade();
    ///
    /// assert!(s.strong_count() == 1);
    /// assert!(s.weak_count() == 1);
    ///
    /// drop(s);
    /// assert!(w.expired());
    /// ```
    pub fn downgrade(&self) -> WeakPtr<T> {
        match self.group {
            Some(group) => {
                if group.counts().weak.fetch_add(1, Relaxed) > MAX_REFCOUNT {
                    std::process::abort();
                }
                WeakPtr::from_group(group)
            }
            None => WeakPtr::new(),
        }
    }

    /// Gets the number of strong pointers in the ownership group, including `self`. Returns `0`
    /// for a null pointer.
    pub fn strong_count(&self) -> usize {
        self.group
            .map_or(0, |group| group.counts().strong.load(Acquire))
    }

    /// Gets the number of weak pointers observing the ownership group.
    pub fn weak_count(&self) -> usize {
        self.group
            .map_or(0, |group| group.counts().weak.load(Acquire) - 1)
    }

    /// Returns `true` if both pointers belong to the same ownership group, or both are null.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.group.map(|group| group.counts) == other.group.map(|group| group.counts)
    }

    /// Returns ownership of the contained value. Returns `Err` if there are other strong pointers
    /// to the value or if `self` is null.
    ///
    /// ```
    /// # use ownptr::SharedPtr;
    /// let s1 = SharedPtr::new(String::from("b"));
    /// let s2 = s1.clone();
    /// let s1 = s1.into_inner().unwrap_err();
    ///
    /// drop(s2);
    /// assert!(s1.into_inner().unwrap() == "b");
    /// ```
    pub fn into_inner(mut self) -> Result<T, Self> {
        let Some(group) = self.group else {
            return Err(self);
        };

        if let Err(strong) = group.counts().strong.compare_exchange(1, 0, Acquire, Relaxed) {
            debug_assert!(strong > 1);

            return Err(self);
        }

        self.group = None;
        // SAFETY: the strong count went from 1 to 0 here, so nothing else can reach the value.
        let value = unsafe { Box::from_raw(group.value.as_ptr()) };
        group.release_weak();

        Ok(*value)
    }
}

impl<T> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        let Some(group) = self.group.take() else {
            return;
        };

        // Only the owner that moves the count from 1 to 0 frees the value.
        if group.counts().strong.fetch_sub(1, Release) != 1 {
            return;
        }
        fence(Acquire);

        trace!("SharedPtr: last owner freeing {:p}", group.value);
        drop(unsafe { Box::from_raw(group.value.as_ptr()) });
        group.release_weak();
    }
}

impl<T> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        if let Some(group) = self.group {
            if group.counts().strong.fetch_add(1, Relaxed) > MAX_REFCOUNT {
                std::process::abort();
            }
        }

        SharedPtr {
            group: self.group,
            _marker: PhantomData,
        }
    }
}

impl<T> Handle for SharedPtr<T> {
    type Target = T;

    fn as_ptr(&self) -> *const T {
        self.get()
    }
}

impl_address_ops!(SharedPtr);

impl<T> Default for SharedPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<Box<T>> for SharedPtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T> From<UniquePtr<T>> for SharedPtr<T> {
    fn from(mut value: UniquePtr<T>) -> Self {
        match value.release() {
            Some(value) => Self::from_box(value),
            None => Self::null(),
        }
    }
}

impl<T> fmt::Debug for SharedPtr<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("SharedPtr");
        if let Ok(value) = self.try_get() {
            f.field(value);
        }
        f.finish()
    }
}
