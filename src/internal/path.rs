use std::cmp::Ordering;

use crate::error::{Error, Result};

// ========================================================================= //

const MAX_NAME_LEN: usize = 31;

// ========================================================================= //

/// Returns the key that CFB sibling ordering sorts on: the UTF-16 encoding of
/// the uppercased name.  Ordering is [shortlex
/// ](https://en.wikipedia.org/wiki/Shortlex_order): shorter encodings first,
/// ties broken by comparing code units.
///
/// The MS-CFB spec technically specifies its own per-code-unit uppercasing
/// table with a handful of exceptions; `str::to_uppercase` matches it for
/// all names that occur in practice.
pub fn sort_key(name: &str) -> Vec<u16> {
    name.to_uppercase().encode_utf16().collect()
}

/// Compares two directory entry names according to CFB sibling ordering.
pub fn compare_names(name1: &str, name2: &str) -> Ordering {
    compare_keys(&sort_key(name1), &sort_key(name2))
}

pub fn compare_keys(key1: &[u16], key2: &[u16]) -> Ordering {
    match key1.len().cmp(&key2.len()) {
        Ordering::Equal => key1.cmp(key2),
        other => other,
    }
}

/// Checks that a storage/stream name is encodable, or returns an error.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName(name.to_string()));
    }
    if name.encode_utf16().count() > MAX_NAME_LEN {
        return Err(Error::FilenameTooLong(name.to_string()));
    }
    for chr in ['/', '\\', ':', '!'] {
        if name.contains(chr) {
            return Err(Error::InvalidName(name.to_string()));
        }
    }
    Ok(())
}

/// Splits a slash-joined path into its component names.  Unlike OS paths,
/// CFB paths in this crate always use forward slashes, and every component
/// (including a trailing empty one) is significant.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').collect()
}

// ========================================================================= //


// ========================================================================= //
