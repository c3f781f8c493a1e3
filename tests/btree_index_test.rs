use anyhow::Result;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;

use tarndb::common::types::{PageId, Rid, INVALID_PAGE_ID};
use tarndb::index::btree::node::BTreeNode;
use tarndb::index::btree::serialization::deserialize_node;
use tarndb::index::BPlusTree;
use tarndb::storage::buffer::BufferPoolManager;

mod common;
use common::create_test_buffer_pool;

fn rid(k: i64) -> Rid {
    Rid::new(1, k as u32)
}

fn read_node(bpm: &Arc<BufferPoolManager>, page_id: PageId) -> Result<BTreeNode<i64>> {
    let page = bpm.fetch_page(page_id)?;
    let node = {
        let guard = page.read();
        deserialize_node::<i64>(&guard)?
    };
    bpm.unpin_page(page_id, false)?;
    Ok(node)
}

/// Depth of every leaf below `page_id`; used to assert equal-depth leaves.
fn leaf_depths(bpm: &Arc<BufferPoolManager>, page_id: PageId, depth: usize, out: &mut Vec<usize>) -> Result<()> {
    let node = read_node(bpm, page_id)?;
    if node.is_leaf {
        out.push(depth);
    } else {
        for child in &node.children {
            leaf_depths(bpm, *child, depth + 1, out)?;
        }
    }
    Ok(())
}

fn collect_keys(tree: &BPlusTree<i64>) -> Result<Vec<i64>> {
    let mut iter = tree.iter()?;
    let mut keys = Vec::new();
    while let Some((k, _)) = iter.next_entry()? {
        keys.push(k);
    }
    Ok(keys)
}

#[test]
fn test_empty_tree() -> Result<()> {
    let (bpm, _temp_file) = create_test_buffer_pool(20)?;
    let tree: BPlusTree<i64> = BPlusTree::new("idx", bpm, 4, 4)?;

    assert!(tree.is_empty()?);
    assert_eq!(tree.get_value(&1)?, None);
    tree.remove(&1)?; // removing from an empty tree is a no-op
    assert!(collect_keys(&tree)?.is_empty());

    Ok(())
}

#[test]
fn test_insert_and_lookup() -> Result<()> {
    let (bpm, _temp_file) = create_test_buffer_pool(20)?;
    let tree: BPlusTree<i64> = BPlusTree::new("idx", bpm, 4, 4)?;

    assert!(tree.insert(42, rid(42))?);
    assert!(!tree.is_empty()?);
    assert_eq!(tree.get_value(&42)?, Some(rid(42)));

    // duplicate keys are refused and leave the original value in place
    assert!(!tree.insert(42, rid(7))?);
    assert_eq!(tree.get_value(&42)?, Some(rid(42)));

    tree.remove(&42)?;
    assert_eq!(tree.get_value(&42)?, None);
    tree.remove(&42)?; // no-op

    Ok(())
}

#[test]
fn test_insert_split_shape() -> Result<()> {
    let (bpm, _temp_file) = create_test_buffer_pool(20)?;
    let tree: BPlusTree<i64> = BPlusTree::new("idx", bpm.clone(), 4, 4)?;

    for k in 1..=6 {
        assert!(tree.insert(k, rid(k))?);
    }

    assert_eq!(tree.get_value(&3)?, Some(rid(3)));
    assert_eq!(tree.get_value(&5)?, Some(rid(5)));
    assert_eq!(tree.get_value(&7)?, None);

    // two levels: root separator 4, leaves [1,2,3] and [4,5,6] linked
    let root = read_node(&bpm, tree.root_page_id()?)?;
    assert!(!root.is_leaf);
    assert_eq!(root.keys, vec![4]);
    assert_eq!(root.children.len(), 2);

    let left = read_node(&bpm, root.children[0])?;
    let right = read_node(&bpm, root.children[1])?;
    assert_eq!(left.keys, vec![1, 2, 3]);
    assert_eq!(right.keys, vec![4, 5, 6]);
    assert_eq!(left.next_leaf, root.children[1]);
    assert_eq!(right.next_leaf, INVALID_PAGE_ID);

    assert_eq!(collect_keys(&tree)?, vec![1, 2, 3, 4, 5, 6]);

    Ok(())
}

#[test]
fn test_delete_borrows_from_right_sibling() -> Result<()> {
    let (bpm, _temp_file) = create_test_buffer_pool(20)?;
    let tree: BPlusTree<i64> = BPlusTree::new("idx", bpm.clone(), 4, 4)?;

    for k in 1..=6 {
        tree.insert(k, rid(k))?;
    }
    tree.remove(&1)?;
    tree.remove(&2)?;

    // [3] underflows and borrows 4 from [4,5,6]; the separator moves to 5
    let root = read_node(&bpm, tree.root_page_id()?)?;
    assert_eq!(root.keys, vec![5]);
    let left = read_node(&bpm, root.children[0])?;
    let right = read_node(&bpm, root.children[1])?;
    assert_eq!(left.keys, vec![3, 4]);
    assert_eq!(right.keys, vec![5, 6]);

    for k in 3..=6 {
        assert_eq!(tree.get_value(&k)?, Some(rid(k)));
    }
    assert_eq!(tree.get_value(&1)?, None);

    Ok(())
}

#[test]
fn test_delete_merges_down_to_leaf_root() -> Result<()> {
    let (bpm, _temp_file) = create_test_buffer_pool(20)?;
    let tree: BPlusTree<i64> = BPlusTree::new("idx", bpm.clone(), 4, 4)?;

    for k in 1..=6 {
        tree.insert(k, rid(k))?;
    }
    for k in [1, 2, 3, 4] {
        tree.remove(&k)?;
    }

    // the two leaves merged and the root collapsed back to a single leaf
    let root = read_node(&bpm, tree.root_page_id()?)?;
    assert!(root.is_leaf);
    assert_eq!(root.keys, vec![5, 6]);
    assert_eq!(collect_keys(&tree)?, vec![5, 6]);

    Ok(())
}

#[test]
fn test_multi_level_growth_keeps_leaves_level() -> Result<()> {
    let (bpm, _temp_file) = create_test_buffer_pool(64)?;
    let tree: BPlusTree<i64> = BPlusTree::new("idx", bpm.clone(), 4, 4)?;

    for k in 1..=60 {
        assert!(tree.insert(k, rid(k))?);
    }

    let root = read_node(&bpm, tree.root_page_id()?)?;
    assert!(!root.is_leaf, "60 keys at order 4 must have split the root");

    let mut depths = Vec::new();
    leaf_depths(&bpm, tree.root_page_id()?, 0, &mut depths)?;
    let first = depths[0];
    assert!(depths.iter().all(|&d| d == first), "leaves at unequal depth");

    assert_eq!(collect_keys(&tree)?, (1..=60).collect::<Vec<_>>());

    Ok(())
}

#[test]
fn test_iter_from_positions_at_lower_bound() -> Result<()> {
    let (bpm, _temp_file) = create_test_buffer_pool(20)?;
    let tree: BPlusTree<i64> = BPlusTree::new("idx", bpm, 4, 4)?;

    for k in [10, 20, 30, 40, 50] {
        tree.insert(k, rid(k))?;
    }

    let mut iter = tree.iter_from(&25)?;
    assert_eq!(iter.next_entry()?.map(|(k, _)| k), Some(30));
    assert_eq!(iter.next_entry()?.map(|(k, _)| k), Some(40));

    let mut iter = tree.iter_from(&51)?;
    assert!(iter.next_entry()?.is_none());
    assert!(iter.is_end());

    Ok(())
}

#[test]
fn test_randomized_churn() -> Result<()> {
    let (bpm, _temp_file) = create_test_buffer_pool(128)?;
    let tree: BPlusTree<i64> = BPlusTree::new("idx", bpm, 4, 5)?;

    let mut rng = rand::rngs::StdRng::seed_from_u64(0xb7_ee);
    let mut keys: Vec<i64> = (1..=200).collect();
    keys.shuffle(&mut rng);

    for &k in &keys {
        assert!(tree.insert(k, rid(k))?, "duplicate-free insert of {k}");
    }
    assert_eq!(collect_keys(&tree)?, (1..=200).collect::<Vec<_>>());

    keys.shuffle(&mut rng);
    let (gone, kept) = keys.split_at(100);
    for &k in gone {
        tree.remove(&k)?;
    }
    for &k in gone {
        assert_eq!(tree.get_value(&k)?, None);
    }
    for &k in kept {
        assert_eq!(tree.get_value(&k)?, Some(rid(k)), "lost key {k}");
    }

    let mut expected: Vec<i64> = kept.to_vec();
    expected.sort_unstable();
    assert_eq!(collect_keys(&tree)?, expected);

    Ok(())
}
