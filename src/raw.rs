use std::{fmt, ptr::NonNull};

use log::trace;

use crate::access::{self, impl_address_ops, AccessError, Handle};

/// A pointer that documents manual deletion.
///
/// `RawPtr` is [`Copy`]. Copies alias the same value without any bookkeeping, so freeing the value
/// through one copy invalidates every other copy. The only things it adds over a bare `*mut T` are
/// a null check on every read and the [`reset`][RawPtr::reset] and [`destroy`][RawPtr::destroy]
/// conveniences.
///
/// ```
/// # use ownptr::{Null, RawPtr};
/// let mut p = RawPtr::new(10);
/// assert!(*p == 10);
///
/// unsafe { p.destroy() };
/// assert!(p == Null);
/// assert!(p.try_get().is_err());
/// ```
pub struct RawPtr<T> {
    ptr: Option<NonNull<T>>,
}

impl<T> RawPtr<T> {
    pub const fn null() -> Self {
        RawPtr { ptr: None }
    }

    /// Moves `value` to the heap. The allocation lives until some copy calls
    /// [`destroy`][RawPtr::destroy], [`reset`][RawPtr::reset] or [`take_box`][RawPtr::take_box].
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    pub fn from_box(value: Box<T>) -> Self {
        RawPtr {
            ptr: Some(NonNull::from(Box::leak(value))),
        }
    }

    /// Wraps an address obtained from [`Box::into_raw`], or null.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from `Box::into_raw` and must not be owned by anything else that
    /// will free it.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        RawPtr {
            ptr: NonNull::new(ptr),
        }
    }

    /// Gets the address without validating it.
    pub fn get(&self) -> *mut T {
        access::address(self.ptr)
    }

    pub fn try_get(&self) -> Result<&T, AccessError> {
        // SAFETY: the freeing operations are `unsafe` and require that no copy reads afterwards.
        access::check(self.ptr).map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Mutable access to the value.
    ///
    /// # Safety
    ///
    /// No other copy of this pointer may be read through while the returned reference lives.
    pub unsafe fn try_get_mut(&mut self) -> Result<&mut T, AccessError> {
        access::check(self.ptr).map(|mut ptr| ptr.as_mut())
    }

    /// Frees the held value, if any, and installs `value` in its place.
    ///
    /// # Safety
    ///
    /// No other copy of the old address may be read through or freed afterwards.
    pub unsafe fn reset(&mut self, value: Option<Box<T>>) {
        if let Some(ptr) = self.ptr.take() {
            trace!("RawPtr: freeing {:p}", ptr);
            drop(Box::from_raw(ptr.as_ptr()));
        }
        self.ptr = value.map(|value| NonNull::from(Box::leak(value)));
    }

    /// Frees the held value, if any, and leaves this pointer null.
    ///
    /// # Safety
    ///
    /// See [`RawPtr::reset`].
    pub unsafe fn destroy(&mut self) {
        self.reset(None);
    }

    /// Converts back into an owning box, leaving this copy null.
    ///
    /// # Safety
    ///
    /// No other copy of the address may be read through or freed afterwards.
    pub unsafe fn take_box(&mut self) -> Option<Box<T>> {
        self.ptr.take().map(|ptr| Box::from_raw(ptr.as_ptr()))
    }
}

impl<T> Handle for RawPtr<T> {
    type Target = T;

    fn as_ptr(&self) -> *const T {
        self.get()
    }
}

impl_address_ops!(RawPtr);

impl<T> Clone for RawPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RawPtr<T> {}

impl<T> Default for RawPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<Box<T>> for RawPtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T> fmt::Debug for RawPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPtr").field(&self.get()).finish()
    }
}
