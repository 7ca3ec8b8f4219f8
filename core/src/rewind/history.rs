//! Arena-backed history storage
//!
//! Entries live in a fixed set of arena slots. A `VecDeque` of slot indices
//! gives their rank order (oldest first) and freed slots go on a free list,
//! so evicting from the middle of the history never moves entry data.
//! Payload buffers of evicted entries are kept for the next capture.

use std::borrow::Cow;
use std::collections::VecDeque;

use tracing::trace;

use crate::codec::{CodecError, Deserializer, Snapshot, checksum, load_committed};
use crate::machine::Machine;

/// Spare payload buffers kept for reuse
const MAX_SPARE_BUFFERS: usize = 8;

/// How an entry came to be captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// Requested once per rendered frame while the Time Machine is on
    Periodic,
    /// Requested explicitly, e.g. before a user action
    Extra,
}

/// One captured machine state
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    sequence: u64,
    label: String,
    kind: CaptureKind,
    cycles: u64,
    frame: u64,
    payload: Vec<u8>,
    compressed: bool,
    raw_len: usize,
    checksum: u64,
}

/// Metadata recorded alongside a snapshot
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub sequence: u64,
    pub label: String,
    pub kind: CaptureKind,
    pub cycles: u64,
    pub frame: u64,
}

impl HistoryEntry {
    /// Store a snapshot, lz4-compressing it when asked
    ///
    /// When the payload is compressed the snapshot's own buffer is no longer
    /// needed and is handed back for reuse.
    pub fn new(info: EntryInfo, snapshot: Snapshot, compress: bool) -> (Self, Option<Vec<u8>>) {
        let raw_len = snapshot.len();
        let checksum = snapshot.checksum();

        let (payload, spare) = if compress {
            let payload = lz4_flex::compress_prepend_size(snapshot.bytes());
            (payload, Some(snapshot.into_bytes()))
        } else {
            (snapshot.into_bytes(), None)
        };

        let entry = Self {
            sequence: info.sequence,
            label: info.label,
            kind: info.kind,
            cycles: info.cycles,
            frame: info.frame,
            payload,
            compressed: compress,
            raw_len,
            checksum,
        };
        (entry, spare)
    }

    /// Monotonic capture number, unique for the lifetime of the manager
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> CaptureKind {
        self.kind
    }

    /// Machine cycle count at capture time
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// History frame clock at capture time
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Bytes held in memory for this entry
    pub fn stored_len(&self) -> usize {
        self.payload.len()
    }

    /// Size of the uncompressed state
    pub fn raw_len(&self) -> usize {
        self.raw_len
    }

    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    fn raw_bytes(&self) -> Result<Cow<'_, [u8]>, CodecError> {
        let bytes = if self.compressed {
            let raw = lz4_flex::decompress_size_prepended(&self.payload)
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            Cow::Owned(raw)
        } else {
            Cow::Borrowed(self.payload.as_slice())
        };

        let found = checksum(&bytes);
        if found != self.checksum {
            return Err(CodecError::ChecksumMismatch {
                expected: self.checksum,
                found,
            });
        }
        Ok(bytes)
    }

    /// Recover the captured snapshot
    pub fn snapshot(&self) -> Result<Snapshot, CodecError> {
        Ok(Snapshot::from_bytes(self.raw_bytes()?.into_owned()))
    }

    /// Load the captured state into `machine`, all or nothing
    pub fn restore_into<M: Machine + ?Sized>(&self, machine: &mut M) -> Result<(), CodecError> {
        let bytes = self.raw_bytes()?;
        load_committed(machine, &mut Deserializer::new(&bytes))
    }

    fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    #[cfg(test)]
    pub(crate) fn corrupt_payload(&mut self) {
        if let Some(byte) = self.payload.last_mut() {
            *byte ^= 0xFF;
        }
    }
}

/// Ordered, capacity-bounded entry storage
#[derive(Debug)]
pub struct HistoryArena {
    slots: Vec<Option<HistoryEntry>>,
    order: VecDeque<usize>,
    free: Vec<usize>,
    spare_buffers: Vec<Vec<u8>>,
    capacity: usize,
}

impl HistoryArena {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            free: Vec::new(),
            spare_buffers: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.order.len() >= self.capacity
    }

    /// Entry at `rank`, 0 being the oldest
    pub fn get(&self, rank: usize) -> Option<&HistoryEntry> {
        let slot = *self.order.get(rank)?;
        self.slots[slot].as_ref()
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, rank: usize) -> Option<&mut HistoryEntry> {
        let slot = *self.order.get(rank)?;
        self.slots[slot].as_mut()
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.order
            .iter()
            .filter_map(move |&slot| self.slots[slot].as_ref())
    }

    /// Capture frames in rank order
    pub fn frames(&self) -> Vec<u64> {
        self.iter().map(HistoryEntry::frame).collect()
    }

    /// Append an entry as the newest; returns its rank
    ///
    /// The caller evicts first when the arena is full.
    pub fn push_back(&mut self, entry: HistoryEntry) -> usize {
        debug_assert!(!self.is_full(), "history arena overflow");
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        self.order.push_back(slot);
        self.order.len() - 1
    }

    /// Remove the entry at `rank`, keeping its buffer for reuse
    pub fn evict(&mut self, rank: usize) -> bool {
        let Some(slot) = self.order.remove(rank) else {
            return false;
        };
        if let Some(entry) = self.slots[slot].take() {
            trace!(
                sequence = entry.sequence(),
                frame = entry.frame(),
                rank,
                "Evicted history entry"
            );
            self.recycle(entry.into_payload());
        }
        self.free.push(slot);
        true
    }

    /// Drop every entry newer than `rank`
    pub fn truncate_after(&mut self, rank: usize) -> usize {
        let mut dropped = 0;
        while self.order.len() > rank + 1 {
            self.evict(self.order.len() - 1);
            dropped += 1;
        }
        dropped
    }

    pub fn clear(&mut self) {
        while !self.order.is_empty() {
            self.evict(self.order.len() - 1);
        }
    }

    /// An empty buffer for the next capture, reused when possible
    pub fn take_buffer(&mut self) -> Vec<u8> {
        self.spare_buffers.pop().unwrap_or_default()
    }

    /// Return a buffer to the reuse pool
    pub fn recycle(&mut self, mut buffer: Vec<u8>) {
        if self.spare_buffers.len() < MAX_SPARE_BUFFERS {
            buffer.clear();
            self.spare_buffers.push(buffer);
        }
    }

    /// Bytes held by stored entries
    pub fn memory_usage(&self) -> usize {
        self.iter().map(HistoryEntry::stored_len).sum()
    }
}
