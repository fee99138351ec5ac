use byteorder::{ByteOrder, LittleEndian};

use crate::internal::consts::{self, END_OF_CHAIN, SECTOR_LEN};

// ========================================================================= //

/// The growing sector region of a document being written, together with the
/// FAT entries that describe it.  Sectors are only ever appended, so every
/// chain this allocator produces is a contiguous ascending run ending in
/// `END_OF_CHAIN`.
#[derive(Clone, Default)]
pub struct Allocator {
    data: Vec<u8>,
    fat: Vec<u32>,
}

impl Allocator {
    pub fn new() -> Allocator {
        Allocator::default()
    }

    /// Appends `data` to the sector region, zero-padded to a whole number of
    /// sectors, and records the FAT chain for it.  Returns the starting
    /// sector id, or `END_OF_CHAIN` if `data` is empty.
    pub fn allocate(&mut self, data: &[u8]) -> u32 {
        if data.is_empty() {
            return END_OF_CHAIN;
        }
        let start = self.next_sector();
        let num_sectors = data.len().div_ceil(SECTOR_LEN);
        self.data.extend_from_slice(data);
        self.data.resize(
            (start as usize + num_sectors) * SECTOR_LEN,
            0,
        );
        for index in 1..num_sectors {
            self.fat.push(start + index as u32);
        }
        self.fat.push(END_OF_CHAIN);
        debug_assert_eq!(self.fat.len() * SECTOR_LEN, self.data.len());
        start
    }

    /// The id the next allocated sector will receive.
    pub fn next_sector(&self) -> u32 {
        (self.data.len() / SECTOR_LEN) as u32
    }

    /// Number of FAT entries recorded so far (equal to the sector count).
    pub fn num_fat_entries(&self) -> usize {
        self.fat.len()
    }

    /// Marks `count` upcoming sectors as FAT sectors (`FAT_SECTOR` entries).
    pub fn reserve_fat_sectors(&mut self, count: usize) {
        self.fat.extend(std::iter::repeat(consts::FAT_SECTOR).take(count));
    }

    /// Marks `count` upcoming sectors as DIFAT sectors (`DIFAT_SECTOR`
    /// entries).
    pub fn reserve_difat_sectors(&mut self, count: usize) {
        self.fat.extend(std::iter::repeat(consts::DIFAT_SECTOR).take(count));
    }

    /// Serializes the FAT, padded with `FREE_SECTOR` bytes to a whole number
    /// of sectors.
    pub fn fat_to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.fat.len() * 4];
        LittleEndian::write_u32_into(&self.fat, &mut bytes);
        let padded = bytes.len().div_ceil(SECTOR_LEN) * SECTOR_LEN;
        bytes.resize(padded, 0xff);
        bytes
    }

    /// Appends raw sector bytes without touching the FAT.  Used for the FAT
    /// and DIFAT sectors themselves, whose entries are reserved separately.
    pub fn append_raw_sectors(&mut self, bytes: &[u8]) {
        debug_assert_eq!(bytes.len() % SECTOR_LEN, 0);
        self.data.extend_from_slice(bytes);
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

// ========================================================================= //


// ========================================================================= //
