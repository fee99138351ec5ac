use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::internal::consts::{self, MAX_REGULAR_STREAM_ID, NO_STREAM};

// ========================================================================= //

macro_rules! malformed {
    ($e:expr) => {
        return Err(Error::MalformedDirectory($e.to_string()))
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err(Error::MalformedDirectory(format!($fmt, $($arg)+)))
    };
}

// ========================================================================= //

/// One 128-byte directory record, in memory.
#[derive(Clone)]
pub struct DirEntry {
    pub name: String,
    pub obj_type: u8,
    pub color: u8,
    pub left_sibling: u32,
    pub right_sibling: u32,
    pub child: u32,
    pub clsid: Uuid,
    pub state_bits: u32,
    pub creation_time: u64,
    pub modified_time: u64,
    pub start_sector: u32,
    pub stream_len: u64,
}

impl DirEntry {
    pub fn unallocated() -> DirEntry {
        DirEntry {
            name: String::new(),
            obj_type: consts::OBJ_TYPE_UNALLOCATED,
            color: consts::COLOR_RED,
            left_sibling: NO_STREAM,
            right_sibling: NO_STREAM,
            child: NO_STREAM,
            clsid: Uuid::nil(),
            state_bits: 0,
            creation_time: 0,
            modified_time: 0,
            start_sector: 0,
            stream_len: 0,
        }
    }

    fn read_clsid<R: Read>(reader: &mut R) -> Result<Uuid> {
        let d1 = reader.read_u32::<LittleEndian>()?;
        let d2 = reader.read_u16::<LittleEndian>()?;
        let d3 = reader.read_u16::<LittleEndian>()?;
        let mut d4 = [0u8; 8];
        reader.read_exact(&mut d4)?;
        Ok(Uuid::from_fields(d1, d2, d3, &d4))
    }

    fn write_clsid<W: Write>(writer: &mut W, clsid: &Uuid) -> Result<()> {
        let (d1, d2, d3, d4) = clsid.as_fields();
        writer.write_u32::<LittleEndian>(d1)?;
        writer.write_u16::<LittleEndian>(d2)?;
        writer.write_u16::<LittleEndian>(d3)?;
        writer.write_all(d4)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<DirEntry> {
        let name: String = {
            let mut name_chars: Vec<u16> = Vec::with_capacity(32);
            for _ in 0..32 {
                name_chars.push(reader.read_u16::<LittleEndian>()?);
            }
            let name_len_bytes = reader.read_u16::<LittleEndian>()?;
            if name_len_bytes > 64 {
                malformed!("name length too large: {}", name_len_bytes);
            } else if name_len_bytes % 2 != 0 {
                malformed!("odd name length: {}", name_len_bytes);
            }
            let name_len_chars = if name_len_bytes > 0 {
                (name_len_bytes / 2 - 1) as usize
            } else {
                0
            };
            debug_assert!(name_len_chars < name_chars.len());
            if name_chars[name_len_chars] != 0 {
                malformed!("name not null-terminated");
            }
            match String::from_utf16(&name_chars[0..name_len_chars]) {
                Ok(name) => name,
                Err(_) => malformed!("name not valid UTF-16"),
            }
        };
        let obj_type = reader.read_u8()?;
        if obj_type != consts::OBJ_TYPE_UNALLOCATED
            && obj_type != consts::OBJ_TYPE_STORAGE
            && obj_type != consts::OBJ_TYPE_STREAM
            && obj_type != consts::OBJ_TYPE_ROOT
        {
            malformed!("invalid object type: {}", obj_type);
        }
        let color = reader.read_u8()?;
        if color != consts::COLOR_RED && color != consts::COLOR_BLACK {
            malformed!("invalid color: {}", color);
        }
        let left_sibling = reader.read_u32::<LittleEndian>()?;
        if left_sibling != NO_STREAM && left_sibling > MAX_REGULAR_STREAM_ID {
            malformed!("invalid left sibling: {}", left_sibling);
        }
        let right_sibling = reader.read_u32::<LittleEndian>()?;
        if right_sibling != NO_STREAM && right_sibling > MAX_REGULAR_STREAM_ID
        {
            malformed!("invalid right sibling: {}", right_sibling);
        }
        let child = reader.read_u32::<LittleEndian>()?;
        if child != NO_STREAM {
            if obj_type == consts::OBJ_TYPE_STREAM {
                malformed!("non-empty stream child: {}", child);
            } else if child > MAX_REGULAR_STREAM_ID {
                malformed!("invalid child: {}", child);
            }
        }
        let clsid = DirEntry::read_clsid(reader)?;
        let state_bits = reader.read_u32::<LittleEndian>()?;
        let creation_time = reader.read_u64::<LittleEndian>()?;
        let modified_time = reader.read_u64::<LittleEndian>()?;
        let start_sector = reader.read_u32::<LittleEndian>()?;

        // This field is supposed to be zero for storages, but some
        // implementations write FREE_SECTOR instead.
        if obj_type == consts::OBJ_TYPE_STORAGE
            && !(start_sector == 0 || start_sector == consts::FREE_SECTOR)
        {
            malformed!("non-zero storage start sector: {}", start_sector);
        }
        // V3 stores stream lengths in the low 32 bits; the high bits are
        // unspecified garbage in some producers.
        let stream_len = reader.read_u64::<LittleEndian>()? & 0xffffffff;
        if obj_type == consts::OBJ_TYPE_STORAGE && stream_len != 0 {
            malformed!("non-zero storage stream length: {}", stream_len);
        }
        Ok(DirEntry {
            name,
            obj_type,
            color,
            left_sibling,
            right_sibling,
            child,
            clsid,
            state_bits,
            creation_time,
            modified_time,
            start_sector,
            stream_len,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let name_utf16: Vec<u16> = self.name.encode_utf16().collect();
        debug_assert!(name_utf16.len() < 32);
        for &chr in name_utf16.iter() {
            writer.write_u16::<LittleEndian>(chr)?;
        }
        for _ in name_utf16.len()..32 {
            writer.write_u16::<LittleEndian>(0)?;
        }
        if self.obj_type == consts::OBJ_TYPE_UNALLOCATED {
            writer.write_u16::<LittleEndian>(0)?;
        } else {
            writer
                .write_u16::<LittleEndian>((name_utf16.len() as u16 + 1) * 2)?;
        }
        writer.write_u8(self.obj_type)?;
        writer.write_u8(self.color)?;
        writer.write_u32::<LittleEndian>(self.left_sibling)?;
        writer.write_u32::<LittleEndian>(self.right_sibling)?;
        writer.write_u32::<LittleEndian>(self.child)?;
        DirEntry::write_clsid(writer, &self.clsid)?;
        writer.write_u32::<LittleEndian>(self.state_bits)?;
        writer.write_u64::<LittleEndian>(self.creation_time)?;
        writer.write_u64::<LittleEndian>(self.modified_time)?;
        writer.write_u32::<LittleEndian>(self.start_sector)?;
        writer.write_u64::<LittleEndian>(self.stream_len)?;
        Ok(())
    }
}

// ========================================================================= //


// ========================================================================= //
