use byteorder::{ByteOrder, LittleEndian};
use fnv::FnvHashSet;
use tracing::debug;

use crate::error::{Error, Result};
use crate::internal::consts::{
    self, DIFAT_SECTOR, END_OF_CHAIN, FAT_SECTOR, FREE_SECTOR, HEADER_LEN,
    INVALID_SECTOR, MAX_REGULAR_SECTOR, MAX_REGULAR_STREAM_ID,
    MINI_SECTOR_LEN, SECTOR_LEN,
};
use crate::internal::{time, DirEntry, Entry, Header};

// ========================================================================= //

macro_rules! malformed {
    ($e:expr) => {
        return Err(Error::MalformedHeader($e.to_string()))
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err(Error::MalformedHeader(format!($fmt, $($arg)+)))
    };
}

// ========================================================================= //

/// A parsed compound file, borrowing the input bytes.  The FAT, MiniFAT,
/// and directory are decoded up front so that chain steps and directory
/// lookups are constant-time; stream payloads are only copied on demand.
pub struct Container<'a> {
    data: &'a [u8],
    fat: Vec<u32>,
    minifat: Vec<u32>,
    directory: Vec<DirEntry>,
}

impl<'a> Container<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Container<'a>> {
        let header = Header::parse(data)?;

        // DIFAT: the 109 header entries, then the chained DIFAT sectors.
        let mut difat: Vec<u32> = Vec::new();
        for &entry in header.initial_difat_entries.iter() {
            if entry == FREE_SECTOR {
                break;
            }
            difat.push(entry);
        }
        let max_sectors = data.len().saturating_sub(HEADER_LEN) / SECTOR_LEN;
        let mut num_difat_sectors = 0usize;
        let mut current_difat_sector = header.first_difat_sector;
        while current_difat_sector != END_OF_CHAIN {
            if num_difat_sectors >= max_sectors {
                return Err(Error::CyclicChain(header.first_difat_sector));
            }
            num_difat_sectors += 1;
            let sector = read_sector(data, current_difat_sector)?;
            for index in 0..consts::DIFAT_ENTRIES_PER_SECTOR {
                let next = LittleEndian::read_u32(&sector[index * 4..]);
                if next == FREE_SECTOR {
                    continue;
                }
                if next > MAX_REGULAR_SECTOR {
                    return Err(Error::CorruptFat(format!(
                        "invalid sector index {next} in DIFAT"
                    )));
                }
                difat.push(next);
            }
            let next = LittleEndian::read_u32(&sector[SECTOR_LEN - 4..]);
            if next != END_OF_CHAIN && next > MAX_REGULAR_SECTOR {
                return Err(Error::CorruptFat(format!(
                    "invalid DIFAT chain link {next}"
                )));
            }
            current_difat_sector = next;
        }
        if header.num_difat_sectors as usize != num_difat_sectors {
            malformed!(
                "incorrect DIFAT chain length (header says {}, actual is {})",
                header.num_difat_sectors,
                num_difat_sectors
            );
        }
        if header.num_fat_sectors as usize != difat.len() {
            malformed!(
                "incorrect number of FAT sectors (header says {}, DIFAT \
                 says {})",
                header.num_fat_sectors,
                difat.len()
            );
        }

        // FAT: the concatenation of the sectors the DIFAT names.
        let mut fat: Vec<u32> =
            Vec::with_capacity(difat.len() * consts::FAT_ENTRIES_PER_SECTOR);
        for &fat_sector in difat.iter() {
            let sector = read_sector(data, fat_sector)?;
            for index in 0..consts::FAT_ENTRIES_PER_SECTOR {
                fat.push(LittleEndian::read_u32(&sector[index * 4..]));
            }
        }
        while fat.last() == Some(&FREE_SECTOR) {
            fat.pop();
        }

        let mut container =
            Container { data, fat, minifat: Vec::new(), directory: Vec::new() };

        // MiniFAT.
        let minifat_sectors = container.chain(header.first_minifat_sector)?;
        if header.num_minifat_sectors as usize != minifat_sectors.len() {
            malformed!(
                "incorrect MiniFAT chain length (header says {}, actual \
                 is {})",
                header.num_minifat_sectors,
                minifat_sectors.len()
            );
        }
        for &minifat_sector in minifat_sectors.iter() {
            let sector = read_sector(data, minifat_sector)?;
            for index in 0..consts::FAT_ENTRIES_PER_SECTOR {
                container
                    .minifat
                    .push(LittleEndian::read_u32(&sector[index * 4..]));
            }
        }
        while container.minifat.last() == Some(&FREE_SECTOR) {
            container.minifat.pop();
        }

        // Directory.
        for &dir_sector in container.chain(header.first_dir_sector)?.iter() {
            let mut sector = read_sector(data, dir_sector)?;
            for _ in 0..consts::DIR_ENTRIES_PER_SECTOR {
                container.directory.push(DirEntry::read_from(&mut sector)?);
            }
        }
        match container.directory.first() {
            Some(root) if root.obj_type == consts::OBJ_TYPE_ROOT => {}
            _ => {
                return Err(Error::MalformedDirectory(
                    "missing root entry".to_string(),
                ))
            }
        }

        debug!(
            num_fat_entries = container.fat.len(),
            num_minifat_entries = container.minifat.len(),
            num_dir_entries = container.directory.len(),
            "parsed compound file"
        );
        Ok(container)
    }

    /// Walks the FAT chain starting at `start` (which may be
    /// `END_OF_CHAIN` for an empty chain).
    fn chain(&self, start: u32) -> Result<Vec<u32>> {
        let mut chain = Vec::new();
        let mut current = start;
        loop {
            match current {
                END_OF_CHAIN | FAT_SECTOR | DIFAT_SECTOR => return Ok(chain),
                FREE_SECTOR => {
                    return Err(Error::CorruptFat(format!(
                        "chain includes free sector (sector {} of chain \
                         starting at {})",
                        chain.len(),
                        start
                    )))
                }
                INVALID_SECTOR => {
                    return Err(Error::CorruptFat(format!(
                        "{current} is not a valid FAT entry"
                    )))
                }
                _ => {}
            }
            if current as usize >= self.fat.len() {
                return Err(Error::CorruptFat(format!(
                    "chain references sector {}, but FAT has only {} entries",
                    current,
                    self.fat.len()
                )));
            }
            if chain.len() >= self.fat.len() {
                return Err(Error::CyclicChain(start));
            }
            chain.push(current);
            current = self.fat[current as usize];
        }
    }

    /// Walks the MiniFAT chain starting at `start`.
    fn mini_chain(&self, start: u32) -> Result<Vec<u32>> {
        let mut chain = Vec::new();
        let mut current = start;
        while current != END_OF_CHAIN {
            if current > MAX_REGULAR_SECTOR {
                return Err(Error::CorruptMiniFat(format!(
                    "{current} is not a valid MiniFAT entry"
                )));
            }
            if current as usize >= self.minifat.len() {
                return Err(Error::CorruptMiniFat(format!(
                    "found reference to mini sector {}, but MiniFAT has \
                     only {} entries",
                    current,
                    self.minifat.len()
                )));
            }
            if chain.len() >= self.minifat.len() {
                return Err(Error::CyclicChain(start));
            }
            chain.push(current);
            current = self.minifat[current as usize];
        }
        Ok(chain)
    }

    /// Enumerates the streams in the directory tree, paths joined with `/`
    /// under `Root Entry`, in the in-order sibling traversal.
    pub fn stream_entries(&self) -> Result<Vec<Entry>> {
        let root = &self.directory[0];
        let mini_stream_start = root.start_sector;
        let mut entries = Vec::new();
        let mut visited = FnvHashSet::default();
        let mut tasks = vec![Task::Traverse {
            id: root.child,
            path: consts::ROOT_DIR_NAME.to_string(),
            creation_time: root.creation_time,
            modified_time: root.modified_time,
        }];
        while let Some(task) = tasks.pop() {
            match task {
                Task::Traverse { id, path, creation_time, modified_time } => {
                    if id > MAX_REGULAR_STREAM_ID {
                        continue;
                    }
                    if id as usize >= self.directory.len() {
                        return Err(Error::MalformedDirectory(format!(
                            "entry id {} out of range",
                            id
                        )));
                    }
                    if !visited.insert(id) {
                        return Err(Error::MalformedDirectory(
                            "loop in directory tree".to_string(),
                        ));
                    }
                    let dir_entry = &self.directory[id as usize];
                    // The child subtree inherits this entry's timestamps
                    // where it has them.
                    let child_creation = if dir_entry.creation_time != 0 {
                        dir_entry.creation_time
                    } else {
                        creation_time
                    };
                    let child_modified = if dir_entry.modified_time != 0 {
                        dir_entry.modified_time
                    } else {
                        modified_time
                    };
                    // Left, node, right, then the child subtree; pushed in
                    // reverse so the stack pops them in that order.
                    tasks.push(Task::Traverse {
                        id: dir_entry.child,
                        path: format!("{}/{}", path, dir_entry.name),
                        creation_time: child_creation,
                        modified_time: child_modified,
                    });
                    tasks.push(Task::Traverse {
                        id: dir_entry.right_sibling,
                        path: path.clone(),
                        creation_time,
                        modified_time,
                    });
                    tasks.push(Task::Visit {
                        id,
                        path: path.clone(),
                        creation_time,
                        modified_time,
                    });
                    tasks.push(Task::Traverse {
                        id: dir_entry.left_sibling,
                        path,
                        creation_time,
                        modified_time,
                    });
                }
                Task::Visit { id, path, creation_time, modified_time } => {
                    let dir_entry = &self.directory[id as usize];
                    if dir_entry.obj_type != consts::OBJ_TYPE_STREAM {
                        continue;
                    }
                    let creation_time = if dir_entry.creation_time != 0 {
                        dir_entry.creation_time
                    } else {
                        creation_time
                    };
                    let modified_time = if dir_entry.modified_time != 0 {
                        dir_entry.modified_time
                    } else {
                        modified_time
                    };
                    let is_mini = dir_entry.stream_len
                        < consts::MINI_STREAM_CUTOFF as u64;
                    entries.push(Entry {
                        name: dir_entry.name.clone(),
                        path: format!("{}/{}", path, dir_entry.name),
                        start_sector: dir_entry.start_sector,
                        stream_len: dir_entry.stream_len,
                        clsid: dir_entry.clsid,
                        created: time::optional_system_time(creation_time),
                        modified: time::optional_system_time(modified_time),
                        mini_stream_sector: is_mini
                            .then_some(mini_stream_start),
                    });
                }
            }
        }
        Ok(entries)
    }

    /// Copies out a stream's payload, truncated to its recorded size.
    pub fn read_stream(&self, entry: &Entry) -> Result<Vec<u8>> {
        if entry.stream_len == 0 {
            return Ok(Vec::new());
        }
        let stream_len = entry.stream_len as usize;
        let mut data = if let Some(mini_root) = entry.mini_stream_sector {
            self.read_mini_stream_chain(entry.start_sector, mini_root)?
        } else {
            let mut data = Vec::new();
            for &sector in self.chain(entry.start_sector)?.iter() {
                data.extend_from_slice(read_sector(self.data, sector)?);
            }
            data
        };
        if data.len() < stream_len {
            return Err(Error::CorruptFat(format!(
                "chain holds {} bytes, but stream is {} bytes",
                data.len(),
                stream_len
            )));
        }
        data.truncate(stream_len);
        Ok(data)
    }

    /// Resolves a mini chain through the mini-stream, 64 bytes per mini
    /// sector.  `mini_root` is the regular sector where the mini-stream
    /// starts (the Root Entry's start sector).
    fn read_mini_stream_chain(
        &self,
        start_mini_sector: u32,
        mini_root: u32,
    ) -> Result<Vec<u8>> {
        let ministream_sectors = self.chain(mini_root)?;
        let mut data = Vec::new();
        for &mini_sector in self.mini_chain(start_mini_sector)?.iter() {
            let offset = mini_sector as usize * MINI_SECTOR_LEN;
            let Some(&sector) = ministream_sectors.get(offset / SECTOR_LEN)
            else {
                return Err(Error::CorruptMiniFat(format!(
                    "found reference to mini sector {}, but the mini stream \
                     has only {} sectors",
                    mini_sector,
                    ministream_sectors.len()
                )));
            };
            let sector_data = read_sector(self.data, sector)?;
            let within = offset % SECTOR_LEN;
            data.extend_from_slice(
                &sector_data[within..within + MINI_SECTOR_LEN],
            );
        }
        Ok(data)
    }
}

enum Task {
    Traverse { id: u32, path: String, creation_time: u64, modified_time: u64 },
    Visit { id: u32, path: String, creation_time: u64, modified_time: u64 },
}

fn read_sector(data: &[u8], sector: u32) -> Result<&[u8]> {
    let start = HEADER_LEN + sector as usize * SECTOR_LEN;
    let end = start + SECTOR_LEN;
    if end > data.len() {
        return Err(Error::SectorOutOfRange { sector, len: data.len() });
    }
    Ok(&data[start..end])
}

// ========================================================================= //


// ========================================================================= //
