//! A library for writing and reading [Compound File Binary](
//! https://en.wikipedia.org/wiki/Compound_File_Binary_Format) (structured
//! storage) containers in a single pass.  See [MS-CFB](
//! https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/) for
//! the format specification.
//!
//! A [`Document`] accumulates named streams and storages in memory and
//! [`render`](Document::render)s them as one V3 container byte string;
//! [`files`] and [`file_data`] decode an existing container from a byte
//! slice.
//!
//! # Example
//!
//! ```
//! let mut doc = cfbf::Document::new();
//! doc.add_stream(cfbf::Document::ROOT, "example.txt", b"Hello, World!");
//! doc.add_file("DirectoryA/example2.txt", b"more data");
//! let bytes = doc.render().unwrap();
//!
//! for entry in cfbf::files(&bytes).unwrap() {
//!     let data = cfbf::file_data(&bytes, &entry).unwrap();
//!     println!("{} is {} bytes", entry.path(), data.len());
//! }
//! ```

#![warn(missing_docs)]

use tracing::debug;

use crate::internal::consts::{self, END_OF_CHAIN};
use crate::internal::directory::{self, Object};
use crate::internal::{difat, path, Allocator, Container, Header, MiniAllocator};

mod error;
mod internal;

pub use crate::error::{Error, Result};
pub use crate::internal::Entry;

// ========================================================================= //

/// A compound document being assembled in memory.
///
/// Stream payloads are packed into sectors as they are added; the allocation
/// tables, directory, and header are computed by [`render`](Document::render).
/// The mutators never fail: anything wrong with the accumulated objects
/// (empty document, oversized stream, unencodable name, duplicate siblings)
/// is reported by `render` before any output is produced.
#[derive(Clone, Default)]
pub struct Document {
    allocator: Allocator,
    minialloc: MiniAllocator,
    objects: Vec<Object>,
}

impl Document {
    /// The parent id for objects added at the top level of the container.
    pub const ROOT: u32 = consts::ROOT_STREAM_ID;

    /// Creates an empty document.
    pub fn new() -> Document {
        Document::default()
    }

    /// Appends a stream under the given parent and returns its object id.
    ///
    /// Payloads below the 4096-byte cutoff go to the mini-stream; larger
    /// ones get regular sectors; empty ones occupy no storage at all.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is neither [`Document::ROOT`] nor an id returned
    /// by [`add_storage`](Document::add_storage).
    pub fn add_stream(&mut self, parent: u32, name: &str, data: &[u8]) -> u32 {
        self.check_parent(parent);
        let start_sector = if data.is_empty() {
            END_OF_CHAIN
        } else if (data.len() as u64) < consts::MINI_STREAM_CUTOFF as u64 {
            self.minialloc.allocate(data)
        } else {
            self.allocator.allocate(data)
        };
        self.push_object(parent, name, false, data.len() as u64, start_sector)
    }

    /// Appends a storage (directory) under the given parent and returns its
    /// object id, for use as the parent of further objects.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is neither [`Document::ROOT`] nor an id returned
    /// by a previous `add_storage` call.
    pub fn add_storage(&mut self, parent: u32, name: &str) -> u32 {
        self.check_parent(parent);
        self.push_object(parent, name, true, 0, 0)
    }

    /// Appends a stream at a slash-joined path, creating any missing
    /// storages along the way, and returns the stream's object id.
    ///
    /// Existing storages are matched by exact name under the same parent;
    /// trailing separators are not permitted (the empty stream name fails
    /// at render time).
    pub fn add_file(&mut self, path: &str, data: &[u8]) -> u32 {
        let parts = path::split_path(path);
        let last = parts.len() - 1;
        let mut parent = Document::ROOT;
        for &part in &parts[..last] {
            parent = match self.find_storage(parent, part) {
                Some(id) => id,
                None => self.add_storage(parent, part),
            };
        }
        self.add_stream(parent, parts[last], data)
    }

    /// Renders the document as a complete CFB container.
    ///
    /// The document itself is not modified; rendering twice produces
    /// identical bytes.
    pub fn render(&self) -> Result<Vec<u8>> {
        directory::validate(&self.objects)?;

        let mut allocator = self.allocator.clone();

        // The mini-stream is an ordinary stream recorded in the Root Entry.
        let ministream_len = self.minialloc.stream_data().len() as u64;
        let ministream_start =
            allocator.allocate(self.minialloc.stream_data());

        let dir_bytes = directory::build(
            &self.objects,
            ministream_start,
            ministream_len,
        )?;
        let first_dir_sector = allocator.allocate(&dir_bytes);

        let minifat_bytes = self.minialloc.minifat_to_bytes();
        let num_minifat_sectors =
            (minifat_bytes.len() / consts::SECTOR_LEN) as u32;
        let first_minifat_sector = allocator.allocate(&minifat_bytes);

        let layout = difat::finish(&mut allocator)?;

        let header = Header {
            num_dir_sectors: 0,
            num_fat_sectors: layout.num_fat_sectors,
            first_dir_sector,
            first_minifat_sector,
            num_minifat_sectors,
            first_difat_sector: layout.first_difat_sector,
            num_difat_sectors: layout.num_difat_sectors,
            initial_difat_entries: layout.header_difat,
        };
        let sector_data = allocator.into_data();
        let mut output =
            Vec::with_capacity(consts::HEADER_LEN + sector_data.len());
        header.write_to(&mut output)?;
        output.extend_from_slice(&sector_data);
        debug!(
            num_objects = self.objects.len(),
            num_sectors = sector_data.len() / consts::SECTOR_LEN,
            num_fat_sectors = layout.num_fat_sectors,
            num_difat_sectors = layout.num_difat_sectors,
            "rendered compound file"
        );
        Ok(output)
    }

    fn find_storage(&self, parent: u32, name: &str) -> Option<u32> {
        self.objects
            .iter()
            .find(|object| {
                object.is_storage
                    && object.parent == parent
                    && object.name == name
            })
            .map(|object| object.id)
    }

    fn push_object(
        &mut self,
        parent: u32,
        name: &str,
        is_storage: bool,
        size: u64,
        start_sector: u32,
    ) -> u32 {
        let id = self.objects.len() as u32 + 1;
        self.objects.push(Object {
            id,
            name: name.to_string(),
            is_storage,
            parent,
            size,
            start_sector,
        });
        id
    }

    fn check_parent(&self, parent: u32) {
        assert!(
            parent == Document::ROOT
                || self
                    .objects
                    .get(parent as usize - 1)
                    .map_or(false, |object| object.is_storage),
            "parent {parent} is not a storage id of this document"
        );
    }
}

// ========================================================================= //

/// Enumerates the streams in a rendered container, in directory-tree order.
///
/// Paths are slash-joined and prefixed with `Root Entry`.
pub fn files(data: &[u8]) -> Result<Vec<Entry>> {
    Container::parse(data)?.stream_entries()
}

/// Returns the payload of one stream of a rendered container, truncated to
/// the size its directory entry records.
pub fn file_data(data: &[u8], entry: &Entry) -> Result<Vec<u8>> {
    Container::parse(data)?.read_stream(entry)
}

// ========================================================================= //
