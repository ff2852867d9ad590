use std::{fmt, marker::PhantomData, mem, ops::DerefMut, ptr::NonNull};

use log::trace;

use crate::access::{self, impl_address_ops, AccessError, Handle};

/// A pointer with exclusive ownership of its value, similar to [`Box`] but nullable.
///
/// `UniquePtr` cannot be cloned. Ownership only moves: by value, through [`take`][UniquePtr::take]
/// which leaves the source null, or out of the type through [`release`][UniquePtr::release]. The
/// value is dropped exactly once when the pointer is dropped or reset.
///
/// ```
/// # use ownptr::{Null, UniquePtr};
/// let mut u1 = UniquePtr::new(30);
/// let u2 = u1.take();
///
/// assert!(u1 == Null);
/// assert!(*u2 == 30);
/// ```
pub struct UniquePtr<T> {
    ptr: Option<NonNull<T>>,
    _marker: PhantomData<T>,
}

unsafe impl<T> Send for UniquePtr<T> where T: Send {}

unsafe impl<T> Sync for UniquePtr<T> where T: Sync {}

impl<T> UniquePtr<T> {
    pub const fn null() -> Self {
        UniquePtr {
            ptr: None,
            _marker: PhantomData,
        }
    }

    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    pub fn from_box(value: Box<T>) -> Self {
        UniquePtr {
            ptr: Some(NonNull::from(Box::leak(value))),
            _marker: PhantomData,
        }
    }

    /// Takes ownership of an address obtained from [`Box::into_raw`], or null.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from `Box::into_raw` and must not be owned by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        UniquePtr {
            ptr: NonNull::new(ptr),
            _marker: PhantomData,
        }
    }

    /// Gets the address without validating it.
    pub fn get(&self) -> *mut T {
        access::address(self.ptr)
    }

    pub fn try_get(&self) -> Result<&T, AccessError> {
        access::check(self.ptr).map(|ptr| unsafe { ptr.as_ref() })
    }

    pub fn try_get_mut(&mut self) -> Result<&mut T, AccessError> {
        access::check(self.ptr).map(|mut ptr| unsafe { ptr.as_mut() })
    }

    /// Drops the current value, if any, and takes ownership of `value`.
    ///
    /// ```
    /// # use ownptr::{Null, UniquePtr};
    /// let mut u = UniquePtr::new(40);
    /// u.reset(Some(Box::new(50)));
    /// assert!(*u == 50);
    ///
    /// u.reset(None);
    /// assert!(u == Null);
    /// ```
    pub fn reset(&mut self, value: Option<Box<T>>) {
        let new = value.map(|value| NonNull::from(Box::leak(value)));
        free(mem::replace(&mut self.ptr, new));
    }

    /// Takes ownership of `ptr`. The current value is dropped only if `ptr` is a different address,
    /// so resetting to the held address is a no-op.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must either be the held address or come from `Box::into_raw` and not be
    /// owned by anything else.
    pub unsafe fn reset_raw(&mut self, ptr: *mut T) {
        if self.get() != ptr {
            let old = mem::replace(&mut self.ptr, NonNull::new(ptr));
            free(old);
        }
    }

    /// Detaches the value without dropping it and leaves this pointer null. Returns `None` for a
    /// null pointer.
    ///
    /// ```
    /// # use ownptr::{Null, UniquePtr};
    /// let mut u = UniquePtr::new(String::from("a"));
    /// let b = u.release().unwrap();
    ///
    /// assert!(u == Null);
    /// assert!(u.release().is_none());
    ///
    /// let u = UniquePtr::from_box(b);
    /// assert!(*u == "a");
    /// ```
    pub fn release(&mut self) -> Option<Box<T>> {
        self.ptr
            .take()
            .map(|ptr| unsafe { Box::from_raw(ptr.as_ptr()) })
    }

    /// Moves ownership into the returned pointer and leaves `self` null.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Leaks the value, returning its address for a later [`UniquePtr::from_raw`].
    pub fn into_raw(mut self) -> *mut T {
        access::address(self.ptr.take())
    }

    pub fn into_inner(mut self) -> Option<T> {
        self.release().map(|value| *value)
    }
}

fn free<T>(ptr: Option<NonNull<T>>) {
    if let Some(ptr) = ptr {
        trace!("UniquePtr: freeing {:p}", ptr);
        // SAFETY: a `UniquePtr` is the only owner of its address.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}

impl<T> Drop for UniquePtr<T> {
    fn drop(&mut self) {
        free(self.ptr.take());
    }
}

impl<T> Handle for UniquePtr<T> {
    type Target = T;

    fn as_ptr(&self) -> *const T {
        self.get()
    }
}

impl_address_ops!(UniquePtr);

impl<T> DerefMut for UniquePtr<T> {
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        match self.try_get_mut() {
            Ok(value) => value,
            Err(err) => access::fail(err),
        }
    }
}

impl<T> Default for UniquePtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<Box<T>> for UniquePtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T> fmt::Debug for UniquePtr<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("UniquePtr");
        if let Ok(value) = self.try_get() {
            f.field(value);
        }
        f.finish()
    }
}
