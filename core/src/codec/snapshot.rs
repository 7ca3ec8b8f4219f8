//! Immutable whole-machine snapshots

use std::fmt;

use super::{CodecError, Deserializer, Serializer};
use crate::machine::Machine;

/// Compute the xxHash3 checksum of a serialized state
///
/// xxHash3 is fast enough to checksum every capture without showing up in
/// frame timings.
pub fn checksum(bytes: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64(bytes)
}

/// Serialized machine state captured at one point in time
///
/// The bytes are fixed at construction. Restoring a snapshot never alters
/// it, so the same snapshot can be restored any number of times.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    data: Vec<u8>,
    checksum: u64,
}

impl Snapshot {
    /// Wrap already-serialized state
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let checksum = checksum(&data);
        Self { data, checksum }
    }

    /// Capture the complete state of a machine
    pub fn capture<M: Machine + ?Sized>(machine: &M) -> Result<Self, CodecError> {
        Self::capture_into(machine, Vec::new())
    }

    /// Capture the complete state of a machine into a recycled buffer
    pub fn capture_into<M: Machine + ?Sized>(
        machine: &M,
        buffer: Vec<u8>,
    ) -> Result<Self, CodecError> {
        let mut out = Serializer::with_buffer(buffer);
        machine.save(&mut out)?;
        Ok(Self::from_bytes(out.into_bytes()))
    }

    /// Load this snapshot into a machine
    ///
    /// On failure the machine is left exactly as it was before the call.
    pub fn restore_into<M: Machine + ?Sized>(&self, machine: &mut M) -> Result<(), CodecError> {
        let mut input = Deserializer::new(&self.data);
        load_committed(machine, &mut input)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Give the underlying buffer back for reuse
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.data.len())
            .field("checksum", &format_args!("{:#018x}", self.checksum))
            .finish()
    }
}

/// Load machine state from a stream, all or nothing
///
/// The machine is backed up before the load. If the load fails partway the
/// backup is restored, so callers never observe a half-loaded machine.
pub fn load_committed<M: Machine + ?Sized>(
    machine: &mut M,
    input: &mut Deserializer<'_>,
) -> Result<(), CodecError> {
    let mut backup = Serializer::new();
    machine.save(&mut backup)?;

    if let Err(err) = machine.load(input) {
        let backup = backup.into_bytes();
        if let Err(restore_err) = machine.load(&mut Deserializer::new(&backup)) {
            tracing::error!(
                error = %restore_err,
                "Failed to restore machine after rejected state"
            );
        }
        return Err(err);
    }

    Ok(())
}
