mod alloc;
pub mod consts;
pub mod difat;
pub mod directory;
mod direntry;
mod entry;
mod header;
mod minialloc;
pub mod path;
mod reader;
pub mod time;

pub use self::alloc::Allocator;
pub use self::direntry::DirEntry;
pub use self::entry::Entry;
pub use self::header::Header;
pub use self::minialloc::MiniAllocator;
pub use self::reader::Container;
