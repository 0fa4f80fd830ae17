use core::marker::PhantomData;
use core::ptr::NonNull;

/// A list hook embedded in an element.
///
/// A link belongs to at most one [`List`] at a time. While it is linked, the
/// element that contains it must neither move nor be freed.
#[derive(Debug, Default)]
pub struct Link {
    prev: Option<NonNull<Link>>,
    next: Option<NonNull<Link>>,
}

impl Link {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            prev: None,
            next: None,
        }
    }
}

/// Intrusive doubly linked list of [`Link`]s.
///
/// The list never owns its elements. Insertion is `unsafe` because the
/// caller promises the link stays valid and pinned until it is removed
/// again; every other operation relies on that promise.
///
/// ```text
///  head                                      tail
///   │                                          │
///   ▼                                          ▼
/// ┌──────┐  next  ┌──────┐  next  ┌──────┐
/// │ link │ ─────► │ link │ ─────► │ link │ ──► None
/// │      │ ◄───── │      │ ◄───── │      │
/// └──────┘  prev  └──────┘  prev  └──────┘
/// ```
pub struct List {
    head: Option<NonNull<Link>>,
    tail: Option<NonNull<Link>>,
    len: usize,
}

// Safety: the list is only reached through a lock or with interrupts
// disabled; raw pointers are only followed there.
unsafe impl Send for List {}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl List {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends `link` at the tail.
    ///
    /// # Safety
    /// `link` must be valid, not part of any list, and stay in place until
    /// it is removed.
    pub unsafe fn push_back(&mut self, mut link: NonNull<Link>) {
        debug_assert!(!self.contains(link), "link already in list");
        unsafe {
            let l = link.as_mut();
            l.prev = self.tail;
            l.next = None;
            match self.tail {
                Some(mut tail) => tail.as_mut().next = Some(link),
                None => self.head = Some(link),
            }
        }
        self.tail = Some(link);
        self.len += 1;
    }

    /// Inserts `link` at the head.
    ///
    /// # Safety
    /// Same contract as [`push_back`](Self::push_back).
    pub unsafe fn push_front(&mut self, mut link: NonNull<Link>) {
        debug_assert!(!self.contains(link), "link already in list");
        unsafe {
            let l = link.as_mut();
            l.prev = None;
            l.next = self.head;
            match self.head {
                Some(mut head) => head.as_mut().prev = Some(link),
                None => self.tail = Some(link),
            }
        }
        self.head = Some(link);
        self.len += 1;
    }

    /// Detaches and returns the head.
    pub fn pop_front(&mut self) -> Option<NonNull<Link>> {
        let head = self.head?;
        unsafe { self.unlink(head) };
        Some(head)
    }

    /// Detaches `link`.
    ///
    /// # Safety
    /// `link` must currently be part of **this** list.
    pub unsafe fn remove(&mut self, link: NonNull<Link>) {
        debug_assert!(self.contains(link), "link not in list");
        unsafe { self.unlink(link) };
    }

    /// Whether `link` is part of this list (linear walk).
    #[must_use]
    pub fn contains(&self, link: NonNull<Link>) -> bool {
        self.iter().any(|l| l == link)
    }

    /// Iterates the links from head to tail.
    ///
    /// The list must not be modified while iterating; collect first if
    /// elements are about to be removed.
    #[must_use]
    pub const fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.head,
            _list: PhantomData,
        }
    }

    unsafe fn unlink(&mut self, mut link: NonNull<Link>) {
        unsafe {
            let l = link.as_mut();
            match l.prev {
                Some(mut prev) => prev.as_mut().next = l.next,
                None => self.head = l.next,
            }
            match l.next {
                Some(mut next) => next.as_mut().prev = l.prev,
                None => self.tail = l.prev,
            }
            l.prev = None;
            l.next = None;
        }
        self.len -= 1;
    }
}

impl core::fmt::Debug for List {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over the links of a [`List`].
pub struct Iter<'a> {
    next: Option<NonNull<Link>>,
    _list: PhantomData<&'a List>,
}

impl Iterator for Iter<'_> {
    type Item = NonNull<Link>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = unsafe { current.as_ref().next };
        Some(current)
    }
}

impl<'a> IntoIterator for &'a List {
    type Item = NonNull<Link>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container_of;

    struct Node {
        value: u32,
        link: Link,
    }

    fn nodes(values: &[u32]) -> Vec<Box<Node>> {
        values
            .iter()
            .map(|&value| {
                Box::new(Node {
                    value,
                    link: Link::new(),
                })
            })
            .collect()
    }

    fn link(node: &mut Node) -> NonNull<Link> {
        NonNull::from(&mut node.link)
    }

    fn values(list: &List) -> Vec<u32> {
        list.iter()
            .map(|l| unsafe { container_of!(l, Node, link).as_ref().value })
            .collect()
    }

    #[test]
    fn fifo_order() {
        let mut n = nodes(&[1, 2, 3]);
        let mut list = List::new();
        for node in &mut n {
            unsafe { list.push_back(link(node)) };
        }
        assert_eq!(values(&list), [1, 2, 3]);
        assert_eq!(list.len(), 3);

        let head = list.pop_front().expect("head");
        assert_eq!(unsafe { container_of!(head, Node, link).as_ref().value }, 1);
        assert_eq!(values(&list), [2, 3]);
    }

    #[test]
    fn push_front_jumps_the_queue() {
        let mut n = nodes(&[1, 2, 3]);
        let mut list = List::new();
        unsafe {
            list.push_back(link(&mut n[0]));
            list.push_back(link(&mut n[1]));
            list.push_front(link(&mut n[2]));
        }
        assert_eq!(values(&list), [3, 1, 2]);
    }

    #[test]
    fn remove_from_middle_and_ends() {
        let mut n = nodes(&[1, 2, 3, 4]);
        let mut list = List::new();
        for node in &mut n {
            unsafe { list.push_back(link(node)) };
        }
        unsafe {
            list.remove(link(&mut n[1]));
            list.remove(link(&mut n[3]));
        }
        assert_eq!(values(&list), [1, 3]);
        assert!(!list.contains(link(&mut n[1])));

        unsafe { list.remove(link(&mut n[0])) };
        assert_eq!(values(&list), [3]);
        assert_eq!(list.pop_front(), Some(link(&mut n[2])));
        assert!(list.is_empty());
        assert_eq!(list.pop_front(), None);
    }

    #[test]
    fn removed_link_can_be_reinserted() {
        let mut n = nodes(&[1, 2]);
        let mut list = List::new();
        unsafe {
            list.push_back(link(&mut n[0]));
            list.push_back(link(&mut n[1]));
            list.remove(link(&mut n[0]));
            list.push_back(link(&mut n[0]));
        }
        assert_eq!(values(&list), [2, 1]);
    }
}
