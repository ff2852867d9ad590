//! Pointer types that make ownership visible in a signature.
//!
//! Four types each wrap a single heap allocated value:
//!
//! - [`RawPtr`] marks code that frees values by hand. It is [`Copy`] and does no bookkeeping;
//!   freeing through one copy invalidates all others, which is why its freeing methods are
//!   `unsafe`.
//! - [`UniquePtr`] owns its value exclusively. It cannot be cloned, ownership moves, and the value
//!   is dropped exactly once.
//! - [`SharedPtr`] is reference counted, similar to [`std::sync::Arc`]. The counts are updated
//!   atomically, so owners may be dropped concurrently from different threads.
//! - [`WeakPtr`] observes a `SharedPtr` ownership group without keeping the value alive. It can
//!   tell whether the value is [`expired`][WeakPtr::expired] and [`lock`][WeakPtr::lock] it into a
//!   new `SharedPtr` while it is not.
//!
//! Unlike [`Box`] and `Arc` all four types can be null. Reading through a null pointer with `*`
//! panics with an [`AccessError`], and every type offers `try_get` (or [`WeakPtr::try_lock`]) to
//! receive the error instead. Pointers compare by address, and against the [`Null`] literal.
//!
//! ```
//! # use ownptr::{AccessError, Null, SharedPtr, UniquePtr};
//! let u = UniquePtr::<i32>::null();
//! assert!(u == Null);
//! assert!(u.try_get() == Err(AccessError::Null));
//!
//! let s1 = SharedPtr::new(1);
//! let s2 = SharedPtr::new(1);
//! assert!(*s1 == *s2);
//! assert!(s1 != s2);
//! ```

mod access;
mod raw;
mod shared;
mod unique;
mod weak;

pub use crate::{
    access::{AccessError, Handle, Null},
    raw::RawPtr,
    shared::SharedPtr,
    unique::UniquePtr,
    weak::WeakPtr,
};

#[cfg(test)]
mod test;
