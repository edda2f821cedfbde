//! Index-based doubly-linked lists
//!
//! Nodes live in an arena (a slice of tasks or timers); a [`List`] only
//! stores arena indices. Each node type carries one [`Link`] per list kind
//! it can belong to, and every list operation is handed a [`Nodes`] view
//! that selects which link to follow. A node can therefore sit on a ready
//! list, the delay queue and a wait list at once without aliasing.

/// Link cell embedded in an arena node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link {
    prev: Option<usize>,
    next: Option<usize>,
    linked: bool,
}

impl Link {
    pub const fn new() -> Self {
        Link {
            prev: None,
            next: None,
            linked: false,
        }
    }

    /// Node is currently on a list through this link
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.linked
    }
}

/// Arena view selecting one link kind
pub struct Nodes<'a, T> {
    slots: &'a mut [T],
    link: fn(&mut T) -> &mut Link,
}

impl<'a, T> Nodes<'a, T> {
    #[inline]
    pub fn new(slots: &'a mut [T], link: fn(&mut T) -> &mut Link) -> Self {
        Nodes { slots, link }
    }

    #[inline]
    fn link(&mut self, idx: usize) -> &mut Link {
        (self.link)(&mut self.slots[idx])
    }

    /// Arena slot at `idx`
    #[inline]
    pub fn slot(&mut self, idx: usize) -> &mut T {
        &mut self.slots[idx]
    }
}

/// Doubly-linked list of arena indices
#[derive(Debug, Clone, Copy, Default)]
pub struct List {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl List {
    pub const fn new() -> Self {
        List {
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub fn front(&self) -> Option<usize> {
        self.head
    }

    #[inline]
    pub fn back(&self) -> Option<usize> {
        self.tail
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Successor of `idx` on this list
    #[inline]
    pub fn next<T>(&self, nodes: &mut Nodes<'_, T>, idx: usize) -> Option<usize> {
        nodes.link(idx).next
    }

    /// Append at the tail
    pub fn push_back<T>(&mut self, nodes: &mut Nodes<'_, T>, idx: usize) {
        debug_assert!(!nodes.link(idx).linked);

        let tail = self.tail;
        *nodes.link(idx) = Link {
            prev: tail,
            next: None,
            linked: true,
        };

        match tail {
            Some(t) => nodes.link(t).next = Some(idx),
            None => self.head = Some(idx),
        }

        self.tail = Some(idx);
        self.len += 1;
    }

    /// Insert at the head
    pub fn push_front<T>(&mut self, nodes: &mut Nodes<'_, T>, idx: usize) {
        match self.head {
            Some(head) => self.insert_before(nodes, head, idx),
            None => self.push_back(nodes, idx),
        }
    }

    /// Insert `idx` immediately before `at`, which must be on this list
    pub fn insert_before<T>(&mut self, nodes: &mut Nodes<'_, T>, at: usize, idx: usize) {
        debug_assert!(!nodes.link(idx).linked);

        let prev = nodes.link(at).prev;
        *nodes.link(idx) = Link {
            prev,
            next: Some(at),
            linked: true,
        };
        nodes.link(at).prev = Some(idx);

        match prev {
            Some(p) => nodes.link(p).next = Some(idx),
            None => self.head = Some(idx),
        }

        self.len += 1;
    }

    /// Unlink `idx`, which must be on this list
    pub fn remove<T>(&mut self, nodes: &mut Nodes<'_, T>, idx: usize) {
        let link = *nodes.link(idx);
        debug_assert!(link.linked);

        match link.prev {
            Some(p) => nodes.link(p).next = link.next,
            None => self.head = link.next,
        }

        match link.next {
            Some(n) => nodes.link(n).prev = link.prev,
            None => self.tail = link.prev,
        }

        *nodes.link(idx) = Link::new();
        self.len -= 1;
    }

    /// Unlink and return the head
    pub fn pop_front<T>(&mut self, nodes: &mut Nodes<'_, T>) -> Option<usize> {
        let head = self.head?;
        self.remove(nodes, head);
        Some(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Node {
        a: Link,
        b: Link,
    }

    fn link_a(n: &mut Node) -> &mut Link {
        &mut n.a
    }

    fn link_b(n: &mut Node) -> &mut Link {
        &mut n.b
    }

    fn collect(list: &List, nodes: &mut Nodes<'_, Node>) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = list.front();
        while let Some(i) = cur {
            out.push(i);
            cur = list.next(nodes, i);
        }
        out
    }

    #[test]
    fn push_remove_keeps_order() {
        let mut arena: Vec<Node> = (0..4).map(|_| Node::default()).collect();
        let mut nodes = Nodes::new(&mut arena[..], link_a);
        let mut list = List::new();

        list.push_back(&mut nodes, 0);
        list.push_back(&mut nodes, 1);
        list.push_front(&mut nodes, 2);
        list.insert_before(&mut nodes, 1, 3);
        assert_eq!(collect(&list, &mut nodes), vec![2, 0, 3, 1]);
        assert_eq!(list.len(), 4);

        list.remove(&mut nodes, 3);
        assert_eq!(collect(&list, &mut nodes), vec![2, 0, 1]);
        assert_eq!(list.pop_front(&mut nodes), Some(2));
        assert_eq!(list.back(), Some(1));

        list.remove(&mut nodes, 1);
        list.remove(&mut nodes, 0);
        assert!(list.is_empty());
        assert_eq!(list.back(), None);
    }

    #[test]
    fn independent_link_kinds() {
        let mut arena: Vec<Node> = (0..3).map(|_| Node::default()).collect();
        let mut first = List::new();
        let mut second = List::new();

        {
            let mut nodes = Nodes::new(&mut arena[..], link_a);
            first.push_back(&mut nodes, 0);
            first.push_back(&mut nodes, 1);
        }
        {
            let mut nodes = Nodes::new(&mut arena[..], link_b);
            second.push_back(&mut nodes, 1);
            second.push_back(&mut nodes, 2);
            second.remove(&mut nodes, 1);
        }

        assert!(arena[1].a.is_linked());
        assert!(!arena[1].b.is_linked());
        assert_eq!(first.len(), 2);
        assert_eq!(second.front(), Some(2));
    }
}
