//! Tests for page splitting and upward propagation
//!
//! These tests verify:
//! - Non-root splits keep the original id as the right half
//! - Sibling links are repaired around the new left half
//! - Root splits turn the root into a branch over two new pages
//! - Branch splits point moved children at their new parent
//! - Entries of mixed sizes are cut by bytes so both halves fit
//! - The seven-key fixture produces the expected tree

use std::io::Cursor;

use pagetree::key::{self, MAX_COLUMN, MIN_COLUMN};
use pagetree::page::{Entry, Layout, NodeKind, Page, PageId, Split};
use pagetree::storage::{PageCache, PageStore};
use pagetree::{BPlusTree, Config, TreeError};

type MemCache = PageCache<Cursor<Vec<u8>>>;

// =============================================================================
// Helper Functions
// =============================================================================

/// Cache with `pages` zeroed pages already allocated (ids 0..pages)
fn cache_with_pages(pages: u32) -> MemCache {
    let mut cache = PageCache::new(PageStore::in_memory(4096).unwrap(), 32).unwrap();
    for _ in 0..pages {
        cache.create_page().unwrap();
    }
    cache
}

fn leaf(id: PageId, keys: &[u32]) -> Page {
    let mut page = Page::new(id, NodeKind::Leaf);
    for &k in keys {
        page.entries.push(Entry::new(key::encode(&[k]), key::encode(&[k])));
    }
    page
}

fn keys_of(page: &Page) -> Vec<u32> {
    page.entries.iter().map(|e| key::decode(&e.key)[0]).collect()
}

fn small_layout() -> Layout {
    Layout {
        page_size: 4096,
        split_threshold: 64,
        key_width: 4,
    }
}

// =============================================================================
// Leaf Split Tests
// =============================================================================

#[test]
fn test_non_root_split_promotes_left_half() {
    // 1: branch over 2 and 3; 2 <-> 3 are sibling leaves
    let mut cache = cache_with_pages(4);

    let mut parent = Page::new(1, NodeKind::Branch);
    parent.entries.push(Entry::pointer(key::encode(&[0]), 2));
    parent.right_pointer = 3;

    let mut w = leaf(2, &[0]);
    w.parent_id = 1;
    w.next_id = 3;

    let mut x = leaf(3, &[1, 2, 3]);
    x.parent_id = 1;
    x.prev_id = 2;

    for page in [&parent, &w, &x] {
        cache.write_page(page).unwrap();
    }

    let split = x.split(&mut cache).unwrap();

    assert_eq!(
        split,
        Split::Promote {
            parent: 1,
            separator: Entry::pointer(key::encode(&[2]), 4),
        }
    );

    let left = cache.read_page(4).unwrap();
    assert_eq!(keys_of(&left), vec![1, 2]);
    assert_eq!(left.parent_id, 1);
    assert_eq!(left.prev_id, 2);
    assert_eq!(left.next_id, 3);

    let right = cache.read_page(3).unwrap();
    assert_eq!(keys_of(&right), vec![3]);
    assert_eq!(right.prev_id, 4);
    assert_eq!(right.next_id, 0);

    assert_eq!(cache.read_page(2).unwrap().next_id, 4);
}

#[test]
fn test_two_entry_split_leaves_one_each() {
    let mut cache = cache_with_pages(3);
    let mut x = leaf(2, &[5, 6]);
    x.parent_id = 1;
    cache.write_page(&x).unwrap();

    x.split(&mut cache).unwrap();

    assert_eq!(keys_of(&cache.read_page(3).unwrap()), vec![5]);
    assert_eq!(keys_of(&cache.read_page(2).unwrap()), vec![6]);
}

#[test]
fn test_root_leaf_split() {
    let mut cache = cache_with_pages(2);
    let mut root = leaf(1, &[0, 1, 2]);
    cache.write_page(&root).unwrap();

    let split = root.split(&mut cache).unwrap();
    assert_eq!(split, Split::Root { left: 2, right: 3 });

    let root = cache.read_page(1).unwrap();
    assert_eq!(root.kind, NodeKind::Branch);
    assert_eq!(root.entries, vec![Entry::pointer(key::encode(&[1]), 2)]);
    assert_eq!(root.right_pointer, 3);
    assert_eq!((root.parent_id, root.prev_id, root.next_id), (0, 0, 0));

    let left = cache.read_page(2).unwrap();
    assert_eq!(left.kind, NodeKind::Leaf);
    assert_eq!(keys_of(&left), vec![0, 1]);
    assert_eq!((left.parent_id, left.prev_id, left.next_id), (1, 0, 3));

    let right = cache.read_page(3).unwrap();
    assert_eq!(right.kind, NodeKind::Leaf);
    assert_eq!(keys_of(&right), vec![2]);
    assert_eq!((right.parent_id, right.prev_id, right.next_id), (1, 2, 0));
}

// =============================================================================
// Branch Split Tests
// =============================================================================

#[test]
fn test_root_branch_split_relinks_children() {
    // Root 1 routes to leaves 2, 3, 4 and right pointer 5
    let mut cache = cache_with_pages(6);

    let mut root = Page::new(1, NodeKind::Branch);
    root.entries.push(Entry::pointer(key::encode(&[10]), 2));
    root.entries.push(Entry::pointer(key::encode(&[20]), 3));
    root.entries.push(Entry::pointer(key::encode(&[30]), 4));
    root.right_pointer = 5;
    cache.write_page(&root).unwrap();

    for (id, k) in [(2, 10), (3, 20), (4, 30), (5, 40)] {
        let mut child = leaf(id, &[k]);
        child.parent_id = 1;
        cache.write_page(&child).unwrap();
    }

    let split = root.split(&mut cache).unwrap();
    assert_eq!(split, Split::Root { left: 6, right: 7 });

    let left = cache.read_page(6).unwrap();
    assert_eq!(left.kind, NodeKind::Branch);
    assert_eq!(left.children().unwrap(), vec![2, 3]);
    assert_eq!(left.right_pointer, 0);

    let right = cache.read_page(7).unwrap();
    assert_eq!(right.children().unwrap(), vec![4, 5]);
    assert_eq!(right.right_pointer, 5);

    assert_eq!(cache.read_page(2).unwrap().parent_id, 6);
    assert_eq!(cache.read_page(3).unwrap().parent_id, 6);
    assert_eq!(cache.read_page(4).unwrap().parent_id, 7);
    assert_eq!(cache.read_page(5).unwrap().parent_id, 7);

    let root = cache.read_page(1).unwrap();
    assert_eq!(root.entries, vec![Entry::pointer(key::encode(&[20]), 6)]);
    assert_eq!(root.right_pointer, 7);
}

// =============================================================================
// Insert Tests
// =============================================================================

#[test]
fn test_insert_splits_root_on_third_entry() {
    let mut cache = cache_with_pages(2);
    let root = leaf(1, &[]);
    cache.write_page(&root).unwrap();

    for k in [5u32, 1, 3] {
        let page = cache.read_page(1).unwrap();
        page.insert(&mut cache, &small_layout(), key::encode(&[k]), key::encode(&[k]))
            .unwrap();
    }

    // Third entry tips 64 bytes and splits the root
    let root = cache.read_page(1).unwrap();
    assert_eq!(root.kind, NodeKind::Branch);
    assert_eq!(keys_of(&cache.read_page(2).unwrap()), vec![1, 3]);
    assert_eq!(keys_of(&cache.read_page(3).unwrap()), vec![5]);
}

#[test]
fn test_insert_duplicate_rejected() {
    let mut cache = cache_with_pages(2);
    cache.write_page(&leaf(1, &[7])).unwrap();

    let page = cache.read_page(1).unwrap();
    let err = page
        .insert(&mut cache, &small_layout(), key::encode(&[7]), key::encode(&[0]))
        .unwrap_err();

    assert!(matches!(err, TreeError::DuplicateKey));
    assert_eq!(keys_of(&cache.read_page(1).unwrap()), vec![7]);
}

#[test]
fn test_insert_short_key_rejected() {
    let mut cache = cache_with_pages(2);
    cache.write_page(&leaf(1, &[7])).unwrap();

    let page = cache.read_page(1).unwrap();
    let err = page
        .insert(&mut cache, &small_layout(), bytes::Bytes::from_static(b"ab"), key::encode(&[0]))
        .unwrap_err();

    assert!(matches!(err, TreeError::InvalidKey { expected: 4, actual: 2 }));
}

// =============================================================================
// Mixed Entry Size Tests
// =============================================================================

/// Tree at the default page size plus a value that makes a maximum-size entry
fn tree_with_big_value() -> (BPlusTree<Cursor<Vec<u8>>>, Vec<u8>) {
    let tree = BPlusTree::in_memory(&Config::default()).unwrap();
    // slot (12) + key (4) + value = max_entry_size
    let big = vec![0x5Au8; tree.layout().max_entry_size() - 16];
    (tree, big)
}

fn scanned_keys(tree: &mut BPlusTree<Cursor<Vec<u8>>>) -> Vec<u32> {
    tree.scan(&key::bound(4, MIN_COLUMN), &key::bound(4, MAX_COLUMN))
        .unwrap()
        .into_iter()
        .map(|(k, _)| key::decode(&k)[0])
        .collect()
}

fn leaf_keys(tree: &mut BPlusTree<Cursor<Vec<u8>>>) -> Vec<Vec<u32>> {
    tree.all()
        .unwrap()
        .iter()
        .filter(|p| p.is_leaf())
        .map(keys_of)
        .collect()
}

#[test]
fn test_root_split_cuts_by_bytes() {
    let (mut tree, big) = tree_with_big_value();

    tree.insert(&key::encode(&[1]), &big).unwrap();
    tree.insert(&key::encode(&[3]), b"abcd").unwrap();
    tree.insert(&key::encode(&[4]), b"abcd").unwrap();
    // Count-based cut would put 1, 2 and 3 on one page: two big entries plus
    // a small one do not fit in 4096 bytes
    tree.insert(&key::encode(&[2]), &big).unwrap();

    tree.check().unwrap();
    assert_eq!(leaf_keys(&mut tree), vec![vec![1, 2], vec![3, 4]]);
    assert_eq!(scanned_keys(&mut tree), vec![1, 2, 3, 4]);
    assert_eq!(tree.get(&key::encode(&[2])).unwrap().as_deref(), Some(&big[..]));
}

#[test]
fn test_non_root_split_cuts_by_bytes() {
    let (mut tree, big) = tree_with_big_value();

    for (k, value) in [
        (5u32, &big[..]),
        (6, &big[..]),
        (7, &b"s"[..]),
        (100, &big[..]),
        (101, &b"s"[..]),
        (102, &b"s"[..]),
    ] {
        tree.insert(&key::encode(&[k]), value).unwrap();
    }
    assert_eq!(leaf_keys(&mut tree), vec![vec![5, 6], vec![7, 100, 101, 102]]);

    tree.insert(&key::encode(&[99]), &big).unwrap();

    tree.check().unwrap();
    assert_eq!(
        leaf_keys(&mut tree),
        vec![vec![5, 6], vec![7, 99], vec![100, 101, 102]]
    );
    assert_eq!(scanned_keys(&mut tree), vec![5, 6, 7, 99, 100, 101, 102]);

    let root = tree.all().unwrap().remove(0);
    assert_eq!(root.children().unwrap(), vec![2, 4, 3]);
}

#[test]
fn test_mixed_sizes_keep_tree_valid() {
    let (mut tree, big) = tree_with_big_value();

    for k in 0..60u32 {
        let scattered = k.wrapping_mul(2_654_435_761);
        let value: &[u8] = if k % 3 == 0 { &big } else { b"small" };
        tree.insert(&key::encode(&[scattered]), value).unwrap();
    }

    tree.check().unwrap();
    assert_eq!(tree.stats().unwrap().entries, 60);
}

#[test]
fn test_split_without_fitting_cut_changes_nothing() {
    // 2 -> 3 sibling chain; page 3 is handed three entries no cut can hold
    let mut cache = cache_with_pages(3);

    let mut w = leaf(2, &[0]);
    w.parent_id = 1;
    w.next_id = 3;
    cache.write_page(&w).unwrap();

    let mut x = Page::new(3, NodeKind::Leaf);
    x.parent_id = 1;
    x.prev_id = 2;
    for k in 1..=3u32 {
        x.entries.push(Entry::new(key::encode(&[k]), vec![0u8; 3000]));
    }

    let err = x.split(&mut cache).unwrap_err();

    assert!(matches!(err, TreeError::PageOverflow { page_id: 3, .. }));
    assert_eq!(x.entries.len(), 3);
    assert_eq!(x.prev_id, 2);
    assert_eq!(cache.store().page_count(), 3);
    assert_eq!(cache.read_page(2).unwrap().next_id, 3);
}

// =============================================================================
// Tree Fixture Tests
// =============================================================================

/// Keys 0..=6 with room for two entries per page
fn seven_key_tree() -> BPlusTree<Cursor<Vec<u8>>> {
    let config = Config::builder().split_threshold(64).build();
    let mut tree = BPlusTree::in_memory(&config).unwrap();
    for k in 0..=6u32 {
        let encoded = key::encode(&[k]);
        tree.insert(&encoded, &encoded).unwrap();
    }
    tree
}

#[test]
fn test_seven_keys_exact_layout() {
    let mut tree = seven_key_tree();
    let pages = tree.all().unwrap();

    let ids: Vec<PageId> = pages.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 6, 2, 4, 7, 5, 3]);

    let root = &pages[0];
    assert_eq!(root.kind, NodeKind::Branch);
    assert_eq!(root.entries, vec![Entry::pointer(key::encode(&[3]), 6)]);
    assert_eq!(root.right_pointer, 7);

    let left_branch = &pages[1];
    assert_eq!(left_branch.kind, NodeKind::Branch);
    assert_eq!(left_branch.parent_id, 1);
    assert_eq!(left_branch.children().unwrap(), vec![2, 4]);
    assert_eq!(left_branch.next_id, 7);

    let right_branch = &pages[4];
    assert_eq!(right_branch.parent_id, 1);
    assert_eq!(right_branch.entries, vec![Entry::pointer(key::encode(&[5]), 5)]);
    assert_eq!(right_branch.right_pointer, 3);
    assert_eq!(right_branch.prev_id, 6);

    // (id, parent, prev, next, keys)
    let leaves: Vec<(PageId, PageId, PageId, PageId, Vec<u32>)> = pages
        .iter()
        .filter(|p| p.is_leaf())
        .map(|p| (p.id, p.parent_id, p.prev_id, p.next_id, keys_of(p)))
        .collect();
    assert_eq!(
        leaves,
        vec![
            (2, 6, 0, 4, vec![0, 1]),
            (4, 6, 2, 5, vec![2, 3]),
            (5, 7, 4, 3, vec![4, 5]),
            (3, 7, 5, 0, vec![6]),
        ]
    );
}

#[test]
fn test_seven_keys_shape() {
    let mut tree = seven_key_tree();
    let stats = tree.stats().unwrap();

    assert_eq!(stats.depth, 2);
    assert_eq!(stats.branch_pages, 3);
    assert_eq!(stats.leaf_pages, 4);
    assert_eq!(stats.entries, 7);

    let keys: Vec<u32> = tree
        .all()
        .unwrap()
        .iter()
        .filter(|p| p.is_leaf())
        .flat_map(keys_of)
        .collect();
    assert_eq!(keys, (0..=6).collect::<Vec<_>>());

    tree.check().unwrap();
}
