use std::time::SystemTime;

use uuid::Uuid;

// ========================================================================= //

/// Metadata about a single stream found in a compound file.
#[derive(Clone, Debug)]
pub struct Entry {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) start_sector: u32,
    pub(crate) stream_len: u64,
    pub(crate) clsid: Uuid,
    pub(crate) created: Option<SystemTime>,
    pub(crate) modified: Option<SystemTime>,
    pub(crate) mini_stream_sector: Option<u32>,
}

impl Entry {
    /// Returns the name of the stream.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stream's full slash-joined path, starting with
    /// `Root Entry`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the first sector of the stream's chain: a mini sector id for
    /// streams below the cutoff, a regular sector id otherwise, or
    /// `END_OF_CHAIN` for empty streams.
    pub fn start_sector(&self) -> u32 {
        self.start_sector
    }

    /// Returns the size of the stream, in bytes.
    pub fn len(&self) -> u64 {
        self.stream_len
    }

    /// Returns whether the stream is empty.
    pub fn is_empty(&self) -> bool {
        self.stream_len == 0
    }

    /// Returns the stream's CLSID (all zero for streams written by this
    /// crate).
    pub fn clsid(&self) -> &Uuid {
        &self.clsid
    }

    /// Returns when the stream was created, if recorded.  Streams inherit
    /// the timestamps of the nearest enclosing storage that has them.
    pub fn created(&self) -> Option<SystemTime> {
        self.created
    }

    /// Returns when the stream was last modified, if recorded.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// For streams stored below the mini-stream cutoff, returns the regular
    /// sector where the mini-stream starts (the Root Entry's start sector).
    /// `None` means the stream lives directly in regular sectors.
    pub fn mini_stream_sector(&self) -> Option<u32> {
        self.mini_stream_sector
    }
}

// ========================================================================= //
