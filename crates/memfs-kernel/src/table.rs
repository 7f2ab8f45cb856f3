//! Inode table: a slot arena with free-list reuse.
//!
//! Slot indices are inode numbers. Slots never move; when the free list runs
//! dry the table doubles its capacity. Released slots go back on the free
//! list and are handed out again last-in first-out, so inode numbers carry
//! no recency information.

use std::ops::{Index, IndexMut};

use tracing::debug;

use crate::inode::Inode;
use crate::types::{Ino, ROOT_INO};

#[derive(Debug, Default)]
struct Slot {
    /// Bumped on every release, so handles can detect reuse.
    generation: u64,
    inode: Option<Inode>,
}

/// Indexed collection of inode slots.
#[derive(Debug)]
pub struct InodeTable {
    slots: Vec<Slot>,
    free: Vec<Ino>,
}

impl InodeTable {
    /// Create a table of `capacity` slots with `root` installed at slot 0.
    ///
    /// `root` is built for inode number [`ROOT_INO`].
    pub fn new(capacity: usize, root: impl FnOnce(Ino) -> Inode) -> Self {
        let capacity = capacity.max(1);
        let mut slots: Vec<Slot> = (0..capacity).map(|_| Slot::default()).collect();
        slots[0].inode = Some(root(ROOT_INO));
        Self {
            slots,
            free: (1..capacity as Ino).collect(),
        }
    }

    /// Take a free slot, doubling capacity first if none remain, and
    /// install the inode `build` produces for it.
    pub fn allocate(&mut self, build: impl FnOnce(Ino) -> Inode) -> Ino {
        if self.free.is_empty() {
            self.grow();
        }
        let Some(ino) = self.free.pop() else {
            unreachable!("free list empty after growth");
        };
        let slot = &mut self.slots[ino as usize];
        debug_assert!(slot.inode.is_none(), "free list held live inode {ino}");
        slot.inode = Some(build(ino));
        debug!(ino, "allocated inode");
        ino
    }

    /// Free a slot and return its inode.
    ///
    /// # Panics
    ///
    /// On the root or on a slot that is already free.
    pub fn release(&mut self, ino: Ino) -> Inode {
        assert_ne!(ino, ROOT_INO, "attempt to release the root inode");
        let slot = self
            .slots
            .get_mut(ino as usize)
            .unwrap_or_else(|| panic!("release of out-of-range inode {ino}"));
        let inode = slot
            .inode
            .take()
            .unwrap_or_else(|| panic!("double release of inode {ino}"));
        slot.generation += 1;
        self.free.push(ino);
        debug!(ino, "released inode");
        inode
    }

    fn grow(&mut self) {
        let old = self.slots.len();
        let new = old * 2;
        self.slots.resize_with(new, Slot::default);
        self.free.extend(old as Ino..new as Ino);
        debug!(old, new, "grew inode table");
    }

    pub fn get(&self, ino: Ino) -> Option<&Inode> {
        self.slots.get(ino as usize)?.inode.as_ref()
    }

    pub fn get_mut(&mut self, ino: Ino) -> Option<&mut Inode> {
        self.slots.get_mut(ino as usize)?.inode.as_mut()
    }

    /// Current generation of a slot. Changes every time the slot is released.
    pub fn generation(&self, ino: Ino) -> u64 {
        self.slots.get(ino as usize).map_or(0, |slot| slot.generation)
    }

    /// True if `ino` is live and has not been released since `generation`.
    pub fn is_current(&self, ino: Ino, generation: u64) -> bool {
        self.slots
            .get(ino as usize)
            .is_some_and(|slot| slot.generation == generation && slot.inode.is_some())
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of free slots.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of live inodes.
    pub fn used(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Live inodes in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Inode> {
        self.slots.iter().filter_map(|slot| slot.inode.as_ref())
    }
}

impl Index<Ino> for InodeTable {
    type Output = Inode;

    fn index(&self, ino: Ino) -> &Inode {
        self.get(ino)
            .unwrap_or_else(|| panic!("inode {ino} is not allocated"))
    }
}

impl IndexMut<Ino> for InodeTable {
    fn index_mut(&mut self, ino: Ino) -> &mut Inode {
        self.get_mut(ino)
            .unwrap_or_else(|| panic!("inode {ino} is not allocated"))
    }
}
