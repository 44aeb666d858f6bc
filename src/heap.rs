//! Addressable min-heap keyed by node id
//!
//! Binary heap plus a probed hash side table mapping node ids to heap
//! slots, so the same structure supports insert, decrease-key and key
//! lookup by node id. Clearing bumps a timestamp instead of touching the
//! table cells, which is what makes per-query reuse of a worker's heaps
//! cheap.

use std::hash::Hasher;

use rustc_hash::FxHasher;

pub type NodeIndex = u32;

const INVALID_POS: u32 = u32::MAX;
const INITIAL_CAPACITY: usize = 1 << 16;

#[derive(Clone, Copy)]
struct HashCell {
    timestamp: u32,
    node: NodeIndex,
    slot: u32,
}

/// Node-id to slot table cleared by timestamp bump.
struct TimestampedTable {
    cells: Vec<HashCell>,
    mask: usize,
    timestamp: u32,
    occupied: usize,
}

impl TimestampedTable {
    fn new() -> Self {
        Self {
            cells: vec![
                HashCell {
                    timestamp: 0,
                    node: 0,
                    slot: INVALID_POS,
                };
                INITIAL_CAPACITY
            ],
            mask: INITIAL_CAPACITY - 1,
            timestamp: 1,
            occupied: 0,
        }
    }

    fn hash(&self, node: NodeIndex) -> usize {
        let mut h = FxHasher::default();
        h.write_u32(node);
        h.finish() as usize & self.mask
    }

    fn find(&self, node: NodeIndex) -> Option<u32> {
        let mut pos = self.hash(node);
        loop {
            let cell = &self.cells[pos];
            if cell.timestamp != self.timestamp {
                return None;
            }
            if cell.node == node {
                return Some(cell.slot);
            }
            pos = (pos + 1) & self.mask;
        }
    }

    fn insert(&mut self, node: NodeIndex, slot: u32) {
        if self.occupied * 2 >= self.cells.len() {
            self.grow();
        }
        let mut pos = self.hash(node);
        loop {
            let cell = &mut self.cells[pos];
            if cell.timestamp != self.timestamp {
                *cell = HashCell {
                    timestamp: self.timestamp,
                    node,
                    slot,
                };
                self.occupied += 1;
                return;
            }
            if cell.node == node {
                cell.slot = slot;
                return;
            }
            pos = (pos + 1) & self.mask;
        }
    }

    fn grow(&mut self) {
        let live: Vec<(NodeIndex, u32)> = self
            .cells
            .iter()
            .filter(|c| c.timestamp == self.timestamp)
            .map(|c| (c.node, c.slot))
            .collect();
        let new_cap = self.cells.len() * 2;
        self.cells = vec![
            HashCell {
                timestamp: 0,
                node: 0,
                slot: INVALID_POS,
            };
            new_cap
        ];
        self.mask = new_cap - 1;
        self.occupied = 0;
        for (node, slot) in live {
            self.insert(node, slot);
        }
    }

    fn clear(&mut self) {
        self.timestamp = self.timestamp.wrapping_add(1);
        self.occupied = 0;
        if self.timestamp == 0 {
            for cell in &mut self.cells {
                cell.timestamp = 0;
            }
            self.timestamp = 1;
        }
    }
}

struct Slot<W, D> {
    node: NodeIndex,
    key: W,
    data: D,
    /// Position in `heap`, or `INVALID_POS` once extracted.
    heap_pos: u32,
}

pub struct AddressableHeap<W, D> {
    slots: Vec<Slot<W, D>>,
    /// Heap of slot indices ordered by key.
    heap: Vec<u32>,
    table: TimestampedTable,
}

impl<W: Ord + Copy, D> AddressableHeap<W, D> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            heap: Vec::new(),
            table: TimestampedTable::new(),
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.heap.clear();
        self.table.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn insert(&mut self, node: NodeIndex, key: W, data: D) {
        debug_assert!(self.table.find(node).is_none(), "node inserted twice");
        let slot = self.slots.len() as u32;
        let pos = self.heap.len() as u32;
        self.slots.push(Slot {
            node,
            key,
            data,
            heap_pos: pos,
        });
        self.heap.push(slot);
        self.table.insert(node, slot);
        self.sift_up(pos as usize);
    }

    pub fn was_inserted(&self, node: NodeIndex) -> bool {
        self.table.find(node).is_some()
    }

    /// True once the node has been extracted from the heap.
    pub fn was_removed(&self, node: NodeIndex) -> bool {
        match self.table.find(node) {
            Some(slot) => self.slots[slot as usize].heap_pos == INVALID_POS,
            None => false,
        }
    }

    pub fn key(&self, node: NodeIndex) -> Option<W> {
        self.table
            .find(node)
            .map(|slot| self.slots[slot as usize].key)
    }

    pub fn data(&self, node: NodeIndex) -> Option<&D> {
        self.table
            .find(node)
            .map(|slot| &self.slots[slot as usize].data)
    }

    pub fn data_mut(&mut self, node: NodeIndex) -> Option<&mut D> {
        match self.table.find(node) {
            Some(slot) => Some(&mut self.slots[slot as usize].data),
            None => None,
        }
    }

    pub fn min_key(&self) -> Option<W> {
        self.heap
            .first()
            .map(|&slot| self.slots[slot as usize].key)
    }

    pub fn extract_min(&mut self) -> Option<(NodeIndex, W)> {
        let top_slot = *self.heap.first()?;
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        self.slots[self.heap[0] as usize].heap_pos = 0;
        self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        let s = &mut self.slots[top_slot as usize];
        s.heap_pos = INVALID_POS;
        Some((s.node, s.key))
    }

    /// Lower the key of an inserted, not-yet-extracted node.
    pub fn decrease_key(&mut self, node: NodeIndex, key: W) {
        let slot = self
            .table
            .find(node)
            .expect("decrease_key on unknown node");
        let s = &mut self.slots[slot as usize];
        debug_assert!(s.heap_pos != INVALID_POS, "decrease_key on removed node");
        debug_assert!(key <= s.key);
        s.key = key;
        let pos = s.heap_pos as usize;
        self.sift_up(pos);
    }

    /// Empty the heap while keeping settled keys addressable. Used to shut
    /// one search direction down early.
    pub fn delete_all(&mut self) {
        for &slot in &self.heap {
            self.slots[slot as usize].heap_pos = INVALID_POS;
        }
        self.heap.clear();
    }

    fn key_at(&self, pos: usize) -> W {
        self.slots[self.heap[pos] as usize].key
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.key_at(parent) <= self.key_at(pos) {
                break;
            }
            self.swap_heap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        loop {
            let left = 2 * pos + 1;
            if left >= self.heap.len() {
                break;
            }
            let right = left + 1;
            let smallest = if right < self.heap.len() && self.key_at(right) < self.key_at(left) {
                right
            } else {
                left
            };
            if self.key_at(pos) <= self.key_at(smallest) {
                break;
            }
            self.swap_heap(pos, smallest);
            pos = smallest;
        }
    }

    fn swap_heap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.slots[self.heap[a] as usize].heap_pos = a as u32;
        self.slots[self.heap[b] as usize].heap_pos = b as u32;
    }
}

impl<W: Ord + Copy, D> Default for AddressableHeap<W, D> {
    fn default() -> Self {
        Self::new()
    }
}
