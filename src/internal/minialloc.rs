use byteorder::{ByteOrder, LittleEndian};

use crate::internal::consts::{END_OF_CHAIN, MINI_SECTOR_LEN, SECTOR_LEN};

// ========================================================================= //

/// The mini-stream of a document being written: sub-cutoff stream payloads
/// packed into 64-byte mini sectors, with the MiniFAT entries describing
/// them.  Works like [`Allocator`](crate::internal::Allocator), but in
/// mini-sector units; the buffer itself becomes a regular stream at render
/// time.
#[derive(Clone, Default)]
pub struct MiniAllocator {
    data: Vec<u8>,
    minifat: Vec<u32>,
}

impl MiniAllocator {
    pub fn new() -> MiniAllocator {
        MiniAllocator::default()
    }

    /// Appends `data` to the mini-stream, zero-padded to a whole number of
    /// mini sectors, and records the MiniFAT chain for it.  Returns the
    /// starting mini sector id, or `END_OF_CHAIN` if `data` is empty.
    pub fn allocate(&mut self, data: &[u8]) -> u32 {
        if data.is_empty() {
            return END_OF_CHAIN;
        }
        let start = (self.data.len() / MINI_SECTOR_LEN) as u32;
        let num_minis = data.len().div_ceil(MINI_SECTOR_LEN);
        self.data.extend_from_slice(data);
        self.data.resize(
            (start as usize + num_minis) * MINI_SECTOR_LEN,
            0,
        );
        for index in 1..num_minis {
            self.minifat.push(start + index as u32);
        }
        self.minifat.push(END_OF_CHAIN);
        debug_assert_eq!(
            self.minifat.len() * MINI_SECTOR_LEN,
            self.data.len()
        );
        start
    }

    /// The mini-stream buffer, ready to be allocated as a regular stream.
    pub fn stream_data(&self) -> &[u8] {
        &self.data
    }

    /// Serializes the MiniFAT, padded with `FREE_SECTOR` bytes to a whole
    /// number of regular sectors.  Returns an empty vector if no mini
    /// sectors were ever allocated.
    pub fn minifat_to_bytes(&self) -> Vec<u8> {
        if self.minifat.is_empty() {
            return Vec::new();
        }
        let mut bytes = vec![0u8; self.minifat.len() * 4];
        LittleEndian::write_u32_into(&self.minifat, &mut bytes);
        let padded = bytes.len().div_ceil(SECTOR_LEN) * SECTOR_LEN;
        bytes.resize(padded, 0xff);
        bytes
    }
}

// ========================================================================= //


// ========================================================================= //
