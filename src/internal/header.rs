use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::internal::consts;

//===========================================================================//

macro_rules! malformed {
    ($e:expr) => {
        return Err(Error::MalformedHeader($e.to_string()))
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err(Error::MalformedHeader(format!($fmt, $($arg)+)))
    };
}

//===========================================================================//

pub struct Header {
    pub num_dir_sectors: u32,
    pub num_fat_sectors: u32,
    pub first_dir_sector: u32,
    pub first_minifat_sector: u32,
    pub num_minifat_sectors: u32,
    pub first_difat_sector: u32,
    pub num_difat_sectors: u32,
    pub initial_difat_entries: [u32; consts::NUM_DIFAT_ENTRIES_IN_HEADER],
}

impl Header {
    pub fn parse(data: &[u8]) -> Result<Header> {
        if data.len() < consts::HEADER_LEN {
            malformed!("{} bytes is too small", data.len());
        }
        let mut reader: &[u8] = data;

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if magic != consts::MAGIC_NUMBER {
            malformed!("wrong magic number");
        }
        reader.read_exact(&mut [0u8; 16])?; // reserved field

        // Read the version number, but don't try to interpret it until after
        // we've checked the byte order mark.
        let _minor_version = reader.read_u16::<LittleEndian>()?;
        let major_version = reader.read_u16::<LittleEndian>()?;

        let byte_order_mark = reader.read_u16::<LittleEndian>()?;
        if byte_order_mark != consts::BYTE_ORDER_MARK {
            malformed!(
                "invalid byte order mark (expected 0x{:04X}, found 0x{:04X})",
                consts::BYTE_ORDER_MARK,
                byte_order_mark
            );
        }

        if major_version != consts::MAJOR_VERSION {
            malformed!("CFB version {} is not supported", major_version);
        }

        let sector_shift = reader.read_u16::<LittleEndian>()?;
        if sector_shift != consts::SECTOR_SHIFT {
            malformed!(
                "incorrect sector shift (expected {}, found {})",
                consts::SECTOR_SHIFT,
                sector_shift
            );
        }

        let mini_sector_shift = reader.read_u16::<LittleEndian>()?;
        if mini_sector_shift != consts::MINI_SECTOR_SHIFT {
            malformed!(
                "incorrect mini sector shift (expected {}, found {})",
                consts::MINI_SECTOR_SHIFT,
                mini_sector_shift
            );
        }

        reader.read_exact(&mut [0u8; 6])?; // reserved field

        // Section 2.2 of the MS-CFB spec requires this field to be zero for
        // V3 files, but some implementations populate it anyway; treat it as
        // zero rather than rejecting the file.
        let mut num_dir_sectors = reader.read_u32::<LittleEndian>()?;
        if num_dir_sectors != 0 {
            num_dir_sectors = 0;
        }

        let num_fat_sectors = reader.read_u32::<LittleEndian>()?;
        let first_dir_sector = reader.read_u32::<LittleEndian>()?;
        let _transaction_signature = reader.read_u32::<LittleEndian>()?;

        let mini_stream_cutoff = reader.read_u32::<LittleEndian>()?;
        if mini_stream_cutoff != consts::MINI_STREAM_CUTOFF {
            malformed!(
                "incorrect mini stream cutoff (expected {}, found {})",
                consts::MINI_STREAM_CUTOFF,
                mini_stream_cutoff
            );
        }

        let first_minifat_sector = reader.read_u32::<LittleEndian>()?;
        let num_minifat_sectors = reader.read_u32::<LittleEndian>()?;
        let mut first_difat_sector = reader.read_u32::<LittleEndian>()?;
        let num_difat_sectors = reader.read_u32::<LittleEndian>()?;

        // Some CFB implementations use FREE_SECTOR to indicate END_OF_CHAIN.
        if first_difat_sector == consts::FREE_SECTOR {
            first_difat_sector = consts::END_OF_CHAIN;
        }

        let mut initial_difat_entries =
            [consts::FREE_SECTOR; consts::NUM_DIFAT_ENTRIES_IN_HEADER];
        for entry in initial_difat_entries.iter_mut() {
            let next = reader.read_u32::<LittleEndian>()?;
            if next == consts::FREE_SECTOR {
                break;
            } else if next > consts::MAX_REGULAR_SECTOR {
                malformed!(
                    "initial DIFAT array refers to invalid sector index \
                     0x{:08X}",
                    next
                );
            }
            *entry = next;
        }

        Ok(Header {
            num_dir_sectors,
            num_fat_sectors,
            first_dir_sector,
            first_minifat_sector,
            num_minifat_sectors,
            first_difat_sector,
            num_difat_sectors,
            initial_difat_entries,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&consts::MAGIC_NUMBER)?;
        writer.write_all(&[0; 16])?; // reserved field
        writer.write_u16::<LittleEndian>(consts::MINOR_VERSION)?;
        writer.write_u16::<LittleEndian>(consts::MAJOR_VERSION)?;
        writer.write_u16::<LittleEndian>(consts::BYTE_ORDER_MARK)?;
        writer.write_u16::<LittleEndian>(consts::SECTOR_SHIFT)?;
        writer.write_u16::<LittleEndian>(consts::MINI_SECTOR_SHIFT)?;
        writer.write_all(&[0; 6])?; // reserved field
        writer.write_u32::<LittleEndian>(self.num_dir_sectors)?;
        writer.write_u32::<LittleEndian>(self.num_fat_sectors)?;
        writer.write_u32::<LittleEndian>(self.first_dir_sector)?;
        writer.write_u32::<LittleEndian>(0)?; // transaction signature (unused)
        writer.write_u32::<LittleEndian>(consts::MINI_STREAM_CUTOFF)?;
        writer.write_u32::<LittleEndian>(self.first_minifat_sector)?;
        writer.write_u32::<LittleEndian>(self.num_minifat_sectors)?;
        writer.write_u32::<LittleEndian>(self.first_difat_sector)?;
        writer.write_u32::<LittleEndian>(self.num_difat_sectors)?;
        for &entry in self.initial_difat_entries.iter() {
            writer.write_u32::<LittleEndian>(entry)?;
        }
        Ok(())
    }
}

//===========================================================================//


//===========================================================================//
