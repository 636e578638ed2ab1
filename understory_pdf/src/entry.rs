// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content entries: runs of drawing instructions that share one state.
//!
//! Entries form a chain in paint order. Consecutive draws with the same state
//! append to the same entry, so the state is emitted once per run. Draws
//! under destination-over compositing go to the head of the chain instead,
//! which paints them beneath everything recorded so far.

use alloc::string::String;
use alloc::vec::Vec;

use crate::state::CapturedState;

/// Handle to an entry in a [`ContentBatch`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

/// Where a newly acquired entry goes in paint order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum EntryPlacement {
    /// After everything recorded so far.
    #[default]
    Above,
    /// Before everything recorded so far.
    Beneath,
}

/// A captured state and the instructions drawn in it.
#[derive(Debug)]
pub struct ContentEntry {
    pub(crate) state: CapturedState,
    content: String,
    next: Option<usize>,
}

impl ContentEntry {
    /// The state the content expects.
    pub fn state(&self) -> &CapturedState {
        &self.state
    }

    /// The buffered instructions.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns `true` if nothing was drawn into this entry.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// The ordered chain of content entries of one device.
#[derive(Debug, Default)]
pub struct ContentBatch {
    entries: Vec<ContentEntry>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl ContentBatch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no instructions have been recorded.
    pub fn is_empty(&self) -> bool {
        self.iter().all(ContentEntry::is_empty)
    }

    /// Number of entries in the chain.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.head = None;
        self.tail = None;
    }

    /// The first entry in paint order.
    pub fn head(&self) -> Option<EntryId> {
        self.head.map(EntryId)
    }

    /// The last entry in paint order.
    pub fn tail(&self) -> Option<EntryId> {
        self.tail.map(EntryId)
    }

    /// The entry behind `id`.
    pub fn get(&self, id: EntryId) -> &ContentEntry {
        &self.entries[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> &mut ContentEntry {
        &mut self.entries[id.0]
    }

    /// The instruction buffer of `id`.
    pub(crate) fn content_mut(&mut self, id: EntryId) -> &mut String {
        &mut self.entries[id.0].content
    }

    /// Entries in paint order.
    pub fn iter(&self) -> Entries<'_> {
        Entries {
            batch: self,
            next: self.head,
        }
    }

    /// Returns an entry to draw `state` into.
    ///
    /// An empty tail is taken over in place when that keeps paint order.
    /// Otherwise an equal tail is reused for [`EntryPlacement::Above`], and
    /// anything else gets a new entry at the requested end of the chain.
    pub fn acquire(&mut self, state: CapturedState, placement: EntryPlacement) -> EntryId {
        if let Some(tail) = self.tail {
            if self.entries[tail].is_empty()
                && (placement == EntryPlacement::Above || self.head == Some(tail))
            {
                self.entries[tail].state = state;
                return EntryId(tail);
            }
            if placement == EntryPlacement::Above
                && state.compare_initial_state(&self.entries[tail].state)
            {
                let entry = &mut self.entries[tail];
                if entry.state.text.is_none() {
                    entry.state.text = state.text;
                }
                return EntryId(tail);
            }
        }

        let index = self.entries.len();
        log::trace!("content entry {index} ({placement:?})");
        match placement {
            EntryPlacement::Above => {
                self.entries.push(ContentEntry {
                    state,
                    content: String::new(),
                    next: None,
                });
                if let Some(tail) = self.tail {
                    self.entries[tail].next = Some(index);
                }
                self.head.get_or_insert(index);
                self.tail = Some(index);
            }
            EntryPlacement::Beneath => {
                self.entries.push(ContentEntry {
                    state,
                    content: String::new(),
                    next: self.head,
                });
                self.head = Some(index);
                self.tail.get_or_insert(index);
            }
        }
        EntryId(index)
    }
}

/// Iterator over a [`ContentBatch`] in paint order.
#[derive(Debug)]
pub struct Entries<'a> {
    batch: &'a ContentBatch,
    next: Option<usize>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = &'a ContentEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = &self.batch.entries[self.next?];
        self.next = entry.next;
        Some(entry)
    }
}
