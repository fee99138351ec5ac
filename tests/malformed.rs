use cfbf::{file_data, files, Document, Error};

//===========================================================================//

/// A container holding one 80-byte stream: sector 0 is the mini-stream,
/// sector 1 the directory, sector 2 the MiniFAT, and sector 3 the FAT.
fn mini_stream_container() -> Vec<u8> {
    let mut doc = Document::new();
    doc.add_stream(Document::ROOT, "foo", &[0x42; 80]);
    let bytes = doc.render().unwrap();
    assert_eq!(bytes.len(), 5 * 512);
    bytes
}

/// A container holding one 5000-byte stream: sectors 0-9 are the stream,
/// sector 10 the directory, and sector 11 the FAT.
fn fat_stream_container() -> Vec<u8> {
    let mut doc = Document::new();
    doc.add_stream(Document::ROOT, "foo", &[0x42; 5000]);
    let bytes = doc.render().unwrap();
    assert_eq!(bytes.len(), 13 * 512);
    bytes
}

fn set_fat_entry(bytes: &mut [u8], index: usize, value: u32) {
    let offset = 512 + 11 * 512 + index * 4;
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

//===========================================================================//

#[test]
#[should_panic(expected = "wrong magic number")]
fn corrupted_magic_number() {
    let mut bytes = mini_stream_container();
    bytes[0] = 0x12;
    files(&bytes).unwrap();
}

#[test]
fn truncated_file_is_out_of_range() {
    let mut bytes = fat_stream_container();
    // Drop the FAT sector off the end of the file.
    bytes.truncate(512 + 11 * 512);
    assert!(matches!(
        files(&bytes),
        Err(Error::SectorOutOfRange { sector: 11, .. })
    ));
}

#[test]
#[should_panic(
    expected = "incorrect number of FAT sectors (header says 2, DIFAT says 1)"
)]
fn lying_fat_sector_count() {
    let mut bytes = mini_stream_container();
    bytes[44] = 2;
    files(&bytes).unwrap();
}

#[test]
#[should_panic(
    expected = "initial DIFAT array refers to invalid sector index 0xFFFFFFFB"
)]
fn reserved_sector_id_in_header_difat() {
    let mut bytes = mini_stream_container();
    bytes[76..80].copy_from_slice(&0xfffffffbu32.to_le_bytes());
    files(&bytes).unwrap();
}

#[test]
fn free_sector_inside_chain_is_corrupt() {
    let mut bytes = fat_stream_container();
    set_fat_entry(&mut bytes, 4, 0xffffffff); // FREE_SECTOR
    let entries = files(&bytes).unwrap();
    assert!(matches!(
        file_data(&bytes, &entries[0]),
        Err(Error::CorruptFat(_))
    ));
}

#[test]
fn reserved_sentinel_inside_chain_is_corrupt() {
    let mut bytes = fat_stream_container();
    set_fat_entry(&mut bytes, 4, 0xfffffffb); // INVALID_SECTOR
    let entries = files(&bytes).unwrap();
    assert!(matches!(
        file_data(&bytes, &entries[0]),
        Err(Error::CorruptFat(_))
    ));
}

#[test]
fn chain_past_fat_length_is_corrupt() {
    let mut bytes = fat_stream_container();
    set_fat_entry(&mut bytes, 9, 5000);
    let entries = files(&bytes).unwrap();
    assert!(matches!(
        file_data(&bytes, &entries[0]),
        Err(Error::CorruptFat(_))
    ));
}

#[test]
fn looping_chain_is_cyclic() {
    let mut bytes = fat_stream_container();
    set_fat_entry(&mut bytes, 9, 0); // tail points back to the head
    let entries = files(&bytes).unwrap();
    assert!(matches!(
        file_data(&bytes, &entries[0]),
        Err(Error::CyclicChain(0))
    ));
}

#[test]
#[should_panic(
    expected = "found reference to mini sector 123456789, but MiniFAT has \
                only 2 entries"
)]
fn invalid_mini_sector_reference() {
    let mut bytes = mini_stream_container();
    // Corrupt the starting mini sector of the stream's directory entry
    // (entry 1 in sector 1, start sector at offset 116).
    let offset = 512 + 512 + 128 + 116;
    bytes[offset..offset + 4].copy_from_slice(&123456789u32.to_le_bytes());
    let entries = files(&bytes).unwrap();
    file_data(&bytes, &entries[0]).unwrap();
}

#[test]
#[should_panic(expected = "invalid object type: 3")]
fn invalid_directory_object_type() {
    let mut bytes = fat_stream_container();
    bytes[512 + 10 * 512 + 66] = 3;
    files(&bytes).unwrap();
}

#[test]
#[should_panic(expected = "missing root entry")]
fn first_entry_is_not_root() {
    let mut bytes = fat_stream_container();
    bytes[512 + 10 * 512 + 66] = 0; // mark the root entry unallocated
    files(&bytes).unwrap();
}

#[test]
#[should_panic(expected = "loop in directory tree")]
fn self_referencing_sibling_link() {
    let mut bytes = fat_stream_container();
    // Point the stream entry's left sibling at itself.
    let offset = 512 + 10 * 512 + 128 + 68;
    bytes[offset..offset + 4].copy_from_slice(&1u32.to_le_bytes());
    files(&bytes).unwrap();
}

#[test]
fn stream_size_longer_than_chain_is_corrupt() {
    let mut bytes = fat_stream_container();
    // Claim 6000 bytes for a 10-sector chain holding 5000.
    let offset = 512 + 10 * 512 + 128 + 120;
    bytes[offset..offset + 8].copy_from_slice(&6000u64.to_le_bytes());
    let entries = files(&bytes).unwrap();
    assert_eq!(entries[0].len(), 6000);
    assert!(matches!(
        file_data(&bytes, &entries[0]),
        Err(Error::CorruptFat(_))
    ));
}

#[test]
fn not_a_cfb_file_at_all() {
    assert!(matches!(
        files(b"this is not a compound file"),
        Err(Error::MalformedHeader(_))
    ));
    assert!(files(&[]).is_err());
}

//===========================================================================//
