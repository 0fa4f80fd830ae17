//! # Allocation-free kernel collections
//!
//! Both collections live in memory the caller provides, so they can be used
//! before (and by) the memory manager itself:
//!
//! * [`Bitmap`]: one bit per page or frame over a borrowed byte buffer.
//! * [`List`]: an intrusive doubly linked list of [`Link`]s embedded in the
//!   elements (free blocks, task control blocks). Use [`container_of!`] to
//!   get from a link back to its element.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod bitmap;
mod list;

pub use bitmap::Bitmap;
pub use list::{Iter, Link, List};

/// Recovers a pointer to the `$ty` that embeds the [`Link`] at `$link` in
/// its field `$field`.
///
/// Expands to an `unsafe` pointer computation; the caller must ensure `$link`
/// really points into a `$ty`.
///
/// ```
/// use core::ptr::NonNull;
/// use kernel_collections::{Link, container_of};
///
/// struct Task {
///     id: u32,
///     link: Link,
/// }
///
/// let mut task = Task { id: 7, link: Link::new() };
/// let link = NonNull::from(&mut task.link);
/// let back: NonNull<Task> = unsafe { container_of!(link, Task, link) };
/// assert_eq!(unsafe { back.as_ref() }.id, 7);
/// ```
#[macro_export]
macro_rules! container_of {
    ($link:expr, $ty:ty, $field:ident) => {
        $link
            .cast::<u8>()
            .byte_sub(::core::mem::offset_of!($ty, $field))
            .cast::<$ty>()
    };
}
