use std::{fmt, ptr::NonNull};

use thiserror::Error;

/// The error returned when reading through a pointer that has no live value behind it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessError {
    #[error("Dereferencing null pointer.")]
    Null,

    #[error("Dereferencing null or expired weak pointer.")]
    Expired,
}

/// The null literal. Every pointer type in this crate compares equal to `Null` when it holds no
/// address.
///
/// ```
/// # use ownptr::{Null, UniquePtr};
/// let u = UniquePtr::<i32>::null();
/// assert!(u == Null);
/// assert!(Null == u);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Null;

impl fmt::Display for Null {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null")
    }
}

/// Common surface of all pointer types: the observed address and whether it is null.
pub trait Handle {
    type Target;

    /// Gets the raw address without validating it.
    fn as_ptr(&self) -> *const Self::Target;

    fn is_null(&self) -> bool {
        self.as_ptr().is_null()
    }
}

/// Validates an address before it is read through.
pub(crate) fn check<T>(ptr: Option<NonNull<T>>) -> Result<NonNull<T>, AccessError> {
    ptr.ok_or(AccessError::Null)
}

#[cold]
#[track_caller]
pub(crate) fn fail(err: AccessError) -> ! {
    panic!("{err}")
}

pub(crate) fn address<T>(ptr: Option<NonNull<T>>) -> *mut T {
    ptr.map_or(std::ptr::null_mut(), NonNull::as_ptr)
}

/// Implements address equality, equality against [`Null`] and `Deref` in terms of `try_get`.
macro_rules! impl_address_ops {
    ($name:ident) => {
        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                std::ptr::eq(
                    $crate::Handle::as_ptr(self),
                    $crate::Handle::as_ptr(other),
                )
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> PartialEq<$crate::Null> for $name<T> {
            fn eq(&self, _: &$crate::Null) -> bool {
                $crate::Handle::is_null(self)
            }
        }

        impl<T> PartialEq<$name<T>> for $crate::Null {
            fn eq(&self, other: &$name<T>) -> bool {
                $crate::Handle::is_null(other)
            }
        }

        impl<T> std::hash::Hash for $name<T> {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                std::hash::Hash::hash(&$crate::Handle::as_ptr(self), state)
            }
        }

        impl<T> std::ops::Deref for $name<T> {
            type Target = T;

            #[track_caller]
            fn deref(&self) -> &T {
                match self.try_get() {
                    Ok(value) => value,
                    Err(err) => $crate::access::fail(err),
                }
            }
        }

        impl<T> std::fmt::Pointer for $name<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Pointer::fmt(&$crate::Handle::as_ptr(self), f)
            }
        }
    };
}

pub(crate) use impl_address_ops;
