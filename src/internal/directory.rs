use uuid::Uuid;

use crate::error::{Error, Result};
use crate::internal::consts::{self, NO_STREAM};
use crate::internal::{path, DirEntry};

// ========================================================================= //

/// A stream or storage recorded in a document before rendering.  Ids are
/// dense and 1-based in insertion order; id 0 is reserved for the Root
/// Entry.
#[derive(Clone)]
pub struct Object {
    pub id: u32,
    pub name: String,
    pub is_storage: bool,
    pub parent: u32,
    pub size: u64,
    pub start_sector: u32,
}

// ========================================================================= //

/// Checks everything `render` promises to reject before emitting output:
/// at least one object, encodable names, V3 stream sizes, and no CFB-equal
/// sibling names.
pub fn validate(objects: &[Object]) -> Result<()> {
    if objects.is_empty() {
        return Err(Error::Empty);
    }
    for object in objects {
        path::validate_name(&object.name)?;
        if object.size > consts::MAX_STREAM_LEN {
            return Err(Error::FileSizeLimitExceeded {
                name: object.name.clone(),
                len: object.size,
            });
        }
    }
    let mut siblings = group_children(objects);
    for kids in siblings.iter_mut() {
        sort_canonical(kids, objects);
        for pair in kids.windows(2) {
            let (prev, next) = (&objects[pair[0]], &objects[pair[1]]);
            if path::compare_names(&prev.name, &next.name).is_eq() {
                return Err(Error::DuplicateName(next.name.clone()));
            }
        }
    }
    Ok(())
}

/// Encodes the directory stream: the Root Entry, one 128-byte record per
/// object in insertion order, and unallocated records padding the total to a
/// whole number of sectors.  Sibling links form the balanced trees that CFB
/// readers search by name.
pub fn build(
    objects: &[Object],
    ministream_start: u32,
    ministream_len: u64,
) -> Result<Vec<u8>> {
    let links = flatten_links(objects);

    let mut bytes =
        Vec::with_capacity((objects.len() + 1) * consts::DIR_ENTRY_LEN);
    let root = DirEntry {
        name: consts::ROOT_DIR_NAME.to_string(),
        obj_type: consts::OBJ_TYPE_ROOT,
        color: consts::COLOR_BLACK,
        left_sibling: NO_STREAM,
        right_sibling: NO_STREAM,
        child: links[0].child,
        clsid: Uuid::nil(),
        state_bits: 0,
        creation_time: 0,
        modified_time: 0,
        start_sector: ministream_start,
        stream_len: ministream_len,
    };
    root.write_to(&mut bytes)?;

    for object in objects {
        let link = &links[object.id as usize];
        let entry = DirEntry {
            name: object.name.clone(),
            obj_type: if object.is_storage {
                consts::OBJ_TYPE_STORAGE
            } else {
                consts::OBJ_TYPE_STREAM
            },
            color: consts::COLOR_BLACK,
            left_sibling: link.left,
            right_sibling: link.right,
            child: link.child,
            clsid: Uuid::nil(),
            state_bits: 0,
            creation_time: 0,
            modified_time: 0,
            start_sector: object.start_sector,
            stream_len: object.size,
        };
        entry.write_to(&mut bytes)?;
    }

    let mut num_entries = objects.len() + 1;
    while num_entries % consts::DIR_ENTRIES_PER_SECTOR != 0 {
        DirEntry::unallocated().write_to(&mut bytes)?;
        num_entries += 1;
    }
    Ok(bytes)
}

// ========================================================================= //

#[derive(Clone, Copy)]
struct Links {
    left: u32,
    right: u32,
    child: u32,
}

const NO_LINKS: Links =
    Links { left: NO_STREAM, right: NO_STREAM, child: NO_STREAM };

/// Produces the sibling/child links for every entry id, shaping each
/// storage's children into a balanced binary tree over the canonical sibling
/// order.
fn flatten_links(objects: &[Object]) -> Vec<Links> {
    let mut links = vec![NO_LINKS; objects.len() + 1];
    let mut children = group_children(objects);
    for (parent, kids) in children.iter_mut().enumerate() {
        if kids.is_empty() {
            continue;
        }
        sort_canonical(kids, objects);
        links[parent].child = shape_subtree(kids, objects, &mut links);
    }
    links
}

/// Indexes of each parent's children, by insertion order.  Index 0 is the
/// root; index i > 0 holds the children of object id i.
fn group_children(objects: &[Object]) -> Vec<Vec<usize>> {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); objects.len() + 1];
    for (index, object) in objects.iter().enumerate() {
        children[object.parent as usize].push(index);
    }
    children
}

fn sort_canonical(kids: &mut [usize], objects: &[Object]) {
    kids.sort_by(|&a, &b| {
        path::compare_names(&objects[a].name, &objects[b].name)
    });
}

/// Splits the sorted run at its midpoint; the middle element becomes the
/// subtree root, with the halves recursing into its left and right links.
fn shape_subtree(
    kids: &[usize],
    objects: &[Object],
    links: &mut [Links],
) -> u32 {
    if kids.is_empty() {
        return NO_STREAM;
    }
    let mid = kids.len() / 2;
    let node = objects[kids[mid]].id;
    links[node as usize].left = shape_subtree(&kids[..mid], objects, links);
    links[node as usize].right =
        shape_subtree(&kids[mid + 1..], objects, links);
    node
}

// ========================================================================= //

#[cfg(test)]
mod tests {
    use super::{build, flatten_links, validate, Object};
    use crate::error::Error;
    use crate::internal::consts::{self, END_OF_CHAIN, NO_STREAM};

    fn stream(id: u32, parent: u32, name: &str) -> Object {
        Object {
            id,
            name: name.to_string(),
            is_storage: false,
            parent,
            size: 3,
            start_sector: 0,
        }
    }

    #[test]
    fn empty_document_is_rejected() {
        assert!(matches!(validate(&[]), Err(Error::Empty)));
    }

    #[test]
    fn oversized_stream_is_rejected() {
        let mut objects = vec![stream(1, 0, "big")];
        objects[0].size = consts::MAX_STREAM_LEN + 1;
        assert!(matches!(
            validate(&objects),
            Err(Error::FileSizeLimitExceeded { .. })
        ));
    }

    #[test]
    fn duplicate_siblings_are_rejected() {
        let objects = vec![stream(1, 0, "foo"), stream(2, 0, "FOO")];
        assert!(matches!(
            validate(&objects),
            Err(Error::DuplicateName(_))
        ));
    }

    #[test]
    fn same_name_in_different_storages_is_fine() {
        let mut dir = stream(1, 0, "dir");
        dir.is_storage = true;
        dir.size = 0;
        let objects = vec![dir, stream(2, 0, "foo"), stream(3, 1, "foo")];
        validate(&objects).unwrap();
    }

    #[test]
    fn four_siblings_shape_a_balanced_tree() {
        let objects = vec![
            stream(1, 0, "example.txt"),
            stream(2, 0, "example2.txt"),
            stream(3, 0, "example3.txt"),
            stream(4, 0, "example4.txt"),
        ];
        let links = flatten_links(&objects);
        // Canonical order is [1, 2, 3, 4]; the midpoint (id 3) roots the
        // sibling tree.
        assert_eq!(links[0].child, 3);
        assert_eq!(links[3].left, 2);
        assert_eq!(links[3].right, 4);
        assert_eq!(links[2].left, 1);
        assert_eq!(links[2].right, NO_STREAM);
        assert_eq!(links[1].left, NO_STREAM);
        assert_eq!(links[1].right, NO_STREAM);
        assert_eq!(links[4].left, NO_STREAM);
        assert_eq!(links[4].right, NO_STREAM);
    }

    #[test]
    fn shorter_uppercased_name_sorts_first() {
        // "b" sorts before "AA" despite case, because shortlex compares
        // lengths first.
        let objects = vec![stream(1, 0, "AA"), stream(2, 0, "b")];
        let links = flatten_links(&objects);
        assert_eq!(links[0].child, 1);
        assert_eq!(links[1].left, 2);
    }

    #[test]
    fn directory_is_padded_to_whole_sectors() {
        let objects = vec![stream(1, 0, "foo")];
        let bytes = build(&objects, END_OF_CHAIN, 0).unwrap();
        assert_eq!(bytes.len(), consts::SECTOR_LEN);
        // Root Entry name.
        assert_eq!(&bytes[0..2], &[b'R', 0]);
        assert_eq!(bytes[66], consts::OBJ_TYPE_ROOT);
        // Object 1 is a stream; entries 2 and 3 are unallocated padding.
        assert_eq!(bytes[128 + 66], consts::OBJ_TYPE_STREAM);
        assert_eq!(bytes[2 * 128 + 66], consts::OBJ_TYPE_UNALLOCATED);
        assert_eq!(bytes[3 * 128 + 66], consts::OBJ_TYPE_UNALLOCATED);
    }
}

// ========================================================================= //
