use byteorder::{ByteOrder, LittleEndian};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::types::{Page, PageId, PAGE_SIZE};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::BTreeNode;

// Node page layout:
// - page type tag: u8 (1 = leaf, 2 = internal)
// - entry count: u16
// - next leaf page id: u32 (leaves only, 0 otherwise)
// - payload length: u32
// - bincode payload (the sorted node body)
pub(crate) const NODE_HEADER_SIZE: usize = 11;

const TAG_LEAF: u8 = 1;
const TAG_INTERNAL: u8 = 2;

/// Serialize a node into a page, header first.
pub fn serialize_node<K>(node: &BTreeNode<K>, page: &mut Page) -> Result<(), BTreeError>
where
    K: Serialize + Clone + Ord,
{
    let payload = bincode::serialize(node)
        .map_err(|e| BTreeError::SerializationError(e.to_string()))?;
    if NODE_HEADER_SIZE + payload.len() > PAGE_SIZE {
        return Err(BTreeError::NodeTooLarge);
    }

    page.data.fill(0);
    page.data[0] = if node.is_leaf { TAG_LEAF } else { TAG_INTERNAL };
    LittleEndian::write_u16(&mut page.data[1..3], node.keys.len() as u16);
    LittleEndian::write_u32(&mut page.data[3..7], node.next_leaf);
    LittleEndian::write_u32(&mut page.data[7..11], payload.len() as u32);
    page.data[NODE_HEADER_SIZE..NODE_HEADER_SIZE + payload.len()].copy_from_slice(&payload);
    Ok(())
}

/// Deserialize a node from a page, validating the header against the body.
pub fn deserialize_node<K>(page: &Page) -> Result<BTreeNode<K>, BTreeError>
where
    K: DeserializeOwned + Clone + Ord,
{
    let tag = page.data[0];
    if tag != TAG_LEAF && tag != TAG_INTERNAL {
        return Err(BTreeError::InvalidPageFormat);
    }
    let key_count = LittleEndian::read_u16(&page.data[1..3]) as usize;
    let payload_len = LittleEndian::read_u32(&page.data[7..11]) as usize;
    if NODE_HEADER_SIZE + payload_len > PAGE_SIZE {
        return Err(BTreeError::InvalidPageFormat);
    }
    let node: BTreeNode<K> =
        bincode::deserialize(&page.data[NODE_HEADER_SIZE..NODE_HEADER_SIZE + payload_len])
            .map_err(|e| BTreeError::DeserializationError(e.to_string()))?;
    if node.keys.len() != key_count || node.is_leaf != (tag == TAG_LEAF) {
        return Err(BTreeError::InvalidPageFormat);
    }
    Ok(node)
}

// The header page stores the tree's root page id at a fixed offset.
const ROOT_ID_OFFSET: usize = 0;

pub fn read_root_page_id(page: &Page) -> PageId {
    LittleEndian::read_u32(&page.data[ROOT_ID_OFFSET..ROOT_ID_OFFSET + 4])
}

pub fn write_root_page_id(page: &mut Page, root_page_id: PageId) {
    LittleEndian::write_u32(&mut page.data[ROOT_ID_OFFSET..ROOT_ID_OFFSET + 4], root_page_id);
}
