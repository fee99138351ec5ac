use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::Result;
use crate::internal::consts::{
    self, DIFAT_ENTRIES_PER_SECTOR, END_OF_CHAIN, FAT_ENTRIES_PER_SECTOR,
    FREE_SECTOR, NUM_DIFAT_ENTRIES_IN_HEADER,
};
use crate::internal::Allocator;

// ========================================================================= //

/// Where the finalized FAT and DIFAT landed, for the header.
pub struct Layout {
    pub num_fat_sectors: u32,
    pub first_difat_sector: u32,
    pub num_difat_sectors: u32,
    pub header_difat: [u32; NUM_DIFAT_ENTRIES_IN_HEADER],
}

/// Appends the FAT sectors and DIFAT sectors to the sector region and
/// returns the resulting layout.  Must be called exactly once, after all
/// data sectors (including the directory and MiniFAT) have been allocated.
///
/// FAT sectors occupy FAT entries, DIFAT sectors occupy FAT entries, and
/// DIFAT sectors are only needed once the FAT outgrows the header, so the
/// sector counts are mutually dependent; `size_fat` resolves them first.
pub fn finish(alloc: &mut Allocator) -> Result<Layout> {
    let data_entries = alloc.num_fat_entries();
    let (num_fat_sectors, num_difat_sectors) = size_fat(data_entries);

    // The FAT sectors land right after the data sectors, with the DIFAT
    // sectors after them, and both kinds self-describe in the FAT.
    let first_fat_sector = alloc.next_sector();
    alloc.reserve_fat_sectors(num_fat_sectors);
    alloc.reserve_difat_sectors(num_difat_sectors);
    let fat_bytes = alloc.fat_to_bytes();
    debug_assert_eq!(
        fat_bytes.len(),
        num_fat_sectors * consts::SECTOR_LEN
    );
    alloc.append_raw_sectors(&fat_bytes);

    let fat_sector_ids: Vec<u32> = (0..num_fat_sectors as u32)
        .map(|index| first_fat_sector + index)
        .collect();

    let mut header_difat = [FREE_SECTOR; NUM_DIFAT_ENTRIES_IN_HEADER];
    for (slot, &sector_id) in header_difat
        .iter_mut()
        .zip(fat_sector_ids.iter().take(NUM_DIFAT_ENTRIES_IN_HEADER))
    {
        *slot = sector_id;
    }

    let first_difat_sector = if num_difat_sectors > 0 {
        first_fat_sector + num_fat_sectors as u32
    } else {
        END_OF_CHAIN
    };
    if num_difat_sectors > 0 {
        let overflow = &fat_sector_ids[NUM_DIFAT_ENTRIES_IN_HEADER..];
        let mut difat_bytes =
            Vec::with_capacity(num_difat_sectors * consts::SECTOR_LEN);
        for (index, block) in
            overflow.chunks(DIFAT_ENTRIES_PER_SECTOR).enumerate()
        {
            for &sector_id in block {
                difat_bytes.write_u32::<LittleEndian>(sector_id)?;
            }
            for _ in block.len()..DIFAT_ENTRIES_PER_SECTOR {
                difat_bytes.write_u32::<LittleEndian>(FREE_SECTOR)?;
            }
            let next = if index + 1 < num_difat_sectors {
                first_difat_sector + index as u32 + 1
            } else {
                END_OF_CHAIN
            };
            difat_bytes.write_u32::<LittleEndian>(next)?;
        }
        debug_assert_eq!(
            difat_bytes.len(),
            num_difat_sectors * consts::SECTOR_LEN
        );
        alloc.append_raw_sectors(&difat_bytes);
    }

    Ok(Layout {
        num_fat_sectors: num_fat_sectors as u32,
        first_difat_sector,
        num_difat_sectors: num_difat_sectors as u32,
        header_difat,
    })
}

/// Finds the least `(num_fat_sectors, num_difat_sectors)` such that the FAT
/// holds one entry per data sector, per FAT sector, and per DIFAT sector,
/// and the DIFAT holds every FAT sector id that does not fit in the header.
///
/// Monotone iteration from a lower bound: each pass recomputes both counts
/// from the current totals and can only grow them, and the counts are
/// bounded above (one extra FAT sector covers 128 more entries but costs
/// only one), so the loop terminates; in practice it stabilizes within two
/// passes.
fn size_fat(data_entries: usize) -> (usize, usize) {
    let mut num_fat_sectors = data_entries.div_ceil(FAT_ENTRIES_PER_SECTOR);
    let mut num_difat_sectors = 0;
    loop {
        let total_entries =
            data_entries + num_fat_sectors + num_difat_sectors;
        let needed_fat = total_entries.div_ceil(FAT_ENTRIES_PER_SECTOR);
        let needed_difat = needed_fat
            .saturating_sub(NUM_DIFAT_ENTRIES_IN_HEADER)
            .div_ceil(DIFAT_ENTRIES_PER_SECTOR);
        if needed_fat == num_fat_sectors
            && needed_difat == num_difat_sectors
        {
            return (num_fat_sectors, num_difat_sectors);
        }
        num_fat_sectors = num_fat_sectors.max(needed_fat);
        num_difat_sectors = num_difat_sectors.max(needed_difat);
    }
}

// ========================================================================= //

#[cfg(test)]
mod tests {
    use super::{finish, size_fat};
    use crate::internal::consts::{
        self, DIFAT_SECTOR, END_OF_CHAIN, FAT_SECTOR, FREE_SECTOR, SECTOR_LEN,
    };
    use crate::internal::Allocator;

    #[test]
    fn one_data_sector_needs_one_fat_sector() {
        assert_eq!(size_fat(1), (1, 0));
    }

    #[test]
    fn self_reference_can_tip_over_a_sector_boundary() {
        // 127 data entries plus the FAT sector itself exactly fill one
        // sector; 128 data entries force a second FAT sector.
        assert_eq!(size_fat(127), (1, 0));
        assert_eq!(size_fat(128), (2, 0));
    }

    #[test]
    fn difat_sectors_appear_past_109_fat_sectors() {
        // 109 * 128 data entries already need 110 FAT sectors once the FAT
        // describes itself, so one entry spills into a DIFAT sector.
        assert_eq!(size_fat(109 * 128), (110, 1));
        // Something that fits comfortably in the header DIFAT.
        assert_eq!(size_fat(100 * 128 - 100), (100, 0));
    }

    #[test]
    fn fixed_point_is_stable() {
        for data_entries in (1..400_000).step_by(997) {
            let (nf, nd) = size_fat(data_entries);
            let total = data_entries + nf + nd;
            // Exactly nf sectors of FAT entries...
            assert!(total <= nf * 128, "data_entries={data_entries}");
            assert!(total > (nf - 1) * 128, "data_entries={data_entries}");
            // ...and exactly nd sectors of DIFAT overflow.
            assert_eq!(
                nd,
                nf.saturating_sub(109).div_ceil(127),
                "data_entries={data_entries}"
            );
        }
    }

    #[test]
    fn emission_self_describes() {
        let mut alloc = Allocator::new();
        alloc.allocate(&[0x11; 3 * SECTOR_LEN]); // sectors 0-2
        let layout = finish(&mut alloc).unwrap();
        assert_eq!(layout.num_fat_sectors, 1);
        assert_eq!(layout.num_difat_sectors, 0);
        assert_eq!(layout.first_difat_sector, END_OF_CHAIN);
        assert_eq!(layout.header_difat[0], 3);
        assert_eq!(layout.header_difat[1], FREE_SECTOR);

        let data = alloc.into_data();
        assert_eq!(data.len(), 4 * SECTOR_LEN);
        // The FAT sector holds the data chain followed by its own entry.
        let fat = &data[3 * SECTOR_LEN..];
        assert_eq!(&fat[0..4], &1u32.to_le_bytes());
        assert_eq!(&fat[4..8], &2u32.to_le_bytes());
        assert_eq!(&fat[8..12], &END_OF_CHAIN.to_le_bytes());
        assert_eq!(&fat[12..16], &FAT_SECTOR.to_le_bytes());
        assert_eq!(&fat[16..20], &FREE_SECTOR.to_le_bytes());
    }

    #[test]
    fn emission_chains_overflow_difat_sectors() {
        let mut alloc = Allocator::new();
        // Enough data sectors that the FAT spills past the header DIFAT.
        let num_data_sectors = 110 * consts::FAT_ENTRIES_PER_SECTOR - 200;
        for _ in 0..num_data_sectors {
            alloc.allocate(&[0x11; 1]);
        }
        let layout = finish(&mut alloc).unwrap();
        assert_eq!(layout.num_fat_sectors, 110);
        assert_eq!(layout.num_difat_sectors, 1);
        let first_fat = num_data_sectors as u32;
        assert_eq!(layout.first_difat_sector, first_fat + 110);
        assert_eq!(layout.header_difat[108], first_fat + 108);

        let data = alloc.into_data();
        let difat_offset = (first_fat as usize + 110) * SECTOR_LEN;
        let difat = &data[difat_offset..difat_offset + SECTOR_LEN];
        // One overflow entry, FREE_SECTOR padding, END_OF_CHAIN pointer.
        assert_eq!(&difat[0..4], &(first_fat + 109).to_le_bytes());
        assert_eq!(&difat[4..8], &FREE_SECTOR.to_le_bytes());
        assert_eq!(&difat[508..512], &END_OF_CHAIN.to_le_bytes());

        // The FAT marks its own sectors and the DIFAT sector.
        let fat_offset = first_fat as usize * SECTOR_LEN;
        let fat_entry = |index: usize| {
            let at = fat_offset + index * 4;
            u32::from_le_bytes(data[at..at + 4].try_into().unwrap())
        };
        assert_eq!(fat_entry(num_data_sectors), FAT_SECTOR);
        assert_eq!(fat_entry(num_data_sectors + 109), FAT_SECTOR);
        assert_eq!(fat_entry(num_data_sectors + 110), DIFAT_SECTOR);
    }
}

// ========================================================================= //
