//! B+ tree mutation: insert, leaf/internal splits, and the root-swap that
//! keeps `root_page_num` stable while the tree grows taller.

use crate::cursor::Cursor;
use crate::error::Error;
use crate::node::{Node, NodeType, INTERNAL_NODE_MAX_CELLS, LEAF_LEFT_SPLIT_COUNT, LEAF_MAX_CELLS, LEAF_RIGHT_SPLIT_COUNT, PAGE_SIZE};
use crate::row::Row;
use crate::table::Table;

pub fn insert(table: &mut Table, row: &Row) -> Result<(), Error> {
    let cursor = Cursor::find(table, row.id)?;
    let exists = table.with_node(cursor.page_num, |n| {
        (cursor.cell_num as u32) < n.leaf_num_cells() && n.leaf_key(cursor.cell_num) == row.id
    })?;
    if exists {
        return Err(Error::DuplicateKey(row.id));
    }
    leaf_insert(table, cursor.page_num, cursor.cell_num, row)
}

fn leaf_insert(table: &mut Table, page_num: u32, cell_num: usize, row: &Row) -> Result<(), Error> {
    let num_cells = table.with_node(page_num, |n| n.leaf_num_cells() as usize)?;
    if num_cells < LEAF_MAX_CELLS {
        let encoded = row.encode()?;
        table.with_node_mut(page_num, |n| {
            n.leaf_shift_right(cell_num);
            n.set_leaf_key(cell_num, row.id);
            n.set_leaf_value(cell_num, &encoded);
            n.set_leaf_num_cells(num_cells as u32 + 1);
        })?;
        Ok(())
    } else {
        leaf_split_and_insert(table, page_num, cell_num, row)
    }
}

fn leaf_split_and_insert(table: &mut Table, old_page_num: u32, cell_num: usize, row: &Row) -> Result<(), Error> {
    let encoded = row.encode()?;

    let (mut cells, old_next_leaf, old_parent, old_is_root) = table.with_node(old_page_num, |n| {
        let num = n.leaf_num_cells() as usize;
        let cells: Vec<(u32, Vec<u8>)> = (0..num).map(|i| (n.leaf_key(i), n.leaf_value(i).to_vec())).collect();
        (cells, n.leaf_next_leaf(), n.parent(), n.is_root())
    })?;
    cells.insert(cell_num, (row.id, encoded.to_vec()));
    debug_assert_eq!(cells.len(), LEAF_MAX_CELLS + 1);

    let new_page_num = table.pager.get_unused_page_num()?;
    table.pager.get_page(new_page_num)?;

    let (left, right) = cells.split_at(LEAF_LEFT_SPLIT_COUNT);
    debug_assert_eq!(right.len(), LEAF_RIGHT_SPLIT_COUNT);

    table.with_node_mut(old_page_num, |n| {
        n.initialize_leaf();
        n.set_parent(old_parent);
        n.set_leaf_num_cells(left.len() as u32);
        for (i, (k, v)) in left.iter().enumerate() {
            n.set_leaf_key(i, *k);
            n.set_leaf_value(i, v);
        }
        n.set_leaf_next_leaf(new_page_num);
    })?;

    table.with_node_mut(new_page_num, |n| {
        n.initialize_leaf();
        n.set_parent(old_parent);
        n.set_leaf_num_cells(right.len() as u32);
        for (i, (k, v)) in right.iter().enumerate() {
            n.set_leaf_key(i, *k);
            n.set_leaf_value(i, v);
        }
        n.set_leaf_next_leaf(old_next_leaf);
    })?;

    if old_is_root {
        create_new_root(table, old_page_num, new_page_num)
    } else {
        let new_old_max = left.last().unwrap().0;
        internal_update_child_key(table, old_parent, old_page_num, new_old_max)?;
        internal_node_insert(table, old_parent, new_page_num)
    }
}

/// Insert `child_page_num` as a child of `parent_page_num`, keyed on the
/// child's own max key. Handles the case where the new child becomes the
/// new rightmost child (its max key exceeds every existing key).
fn internal_node_insert(table: &mut Table, parent_page_num: u32, child_page_num: u32) -> Result<(), Error> {
    let child_key = node_max_key(table, child_page_num)?;
    set_node_parent(table, child_page_num, parent_page_num)?;

    let (num_keys, right_child) =
        table.with_node(parent_page_num, |n| (n.internal_num_keys() as usize, n.internal_right_child()))?;
    let right_key = node_max_key(table, right_child)?;

    let mut entries: Vec<(u32, u32)> =
        table.with_node(parent_page_num, |n| (0..num_keys).map(|i| (n.internal_key(i), n.internal_child(i))).collect())?;
    entries.push((right_key, right_child));

    let pos = entries.partition_point(|&(k, _)| k < child_key);
    entries.insert(pos, (child_key, child_page_num));

    if entries.len() - 1 <= INTERNAL_NODE_MAX_CELLS {
        let (_, new_right_child) = entries.pop().unwrap();
        table.with_node_mut(parent_page_num, |n| {
            n.set_internal_num_keys(entries.len() as u32);
            for (i, (k, c)) in entries.iter().enumerate() {
                n.set_internal_key(i, *k);
                n.set_internal_child(i, *c);
            }
            n.set_internal_right_child(new_right_child);
        })?;
        Ok(())
    } else {
        internal_node_split_and_insert(table, parent_page_num, entries)
    }
}

fn internal_node_split_and_insert(table: &mut Table, old_page_num: u32, entries: Vec<(u32, u32)>) -> Result<(), Error> {
    let (old_parent, old_is_root) = table.with_node(old_page_num, |n| (n.parent(), n.is_root()))?;

    let new_page_num = table.pager.get_unused_page_num()?;
    table.pager.get_page(new_page_num)?;

    let left_count = (entries.len() + 1) / 2;
    let (left, right) = entries.split_at(left_count);

    write_internal_node(table, old_page_num, left, old_parent)?;
    write_internal_node(table, new_page_num, right, old_parent)?;

    for &(_, child) in left {
        set_node_parent(table, child, old_page_num)?;
    }
    for &(_, child) in right {
        set_node_parent(table, child, new_page_num)?;
    }

    if old_is_root {
        create_new_root(table, old_page_num, new_page_num)
    } else {
        let new_old_max = node_max_key(table, old_page_num)?;
        internal_update_child_key(table, old_parent, old_page_num, new_old_max)?;
        internal_node_insert(table, old_parent, new_page_num)
    }
}

fn write_internal_node(table: &mut Table, page_num: u32, entries: &[(u32, u32)], parent: u32) -> Result<(), Error> {
    let (keyed, rightmost) = entries.split_at(entries.len() - 1);
    let right_child = rightmost[0].1;
    table.with_node_mut(page_num, |n| {
        n.initialize_internal();
        n.set_parent(parent);
        n.set_internal_num_keys(keyed.len() as u32);
        for (i, (k, c)) in keyed.iter().enumerate() {
            n.set_internal_key(i, *k);
            n.set_internal_child(i, *c);
        }
        n.set_internal_right_child(right_child);
    })
}

/// The root page number never changes. When it overflows, its current
/// contents are copied wholesale into a freshly allocated left-child page,
/// and the root page is rewritten in place as a two-child internal node.
fn create_new_root(table: &mut Table, old_root_page_num: u32, right_child_page_num: u32) -> Result<(), Error> {
    let root_page_num = table.root_page_num;
    debug_assert_eq!(old_root_page_num, root_page_num);

    let new_left_page_num = table.pager.get_unused_page_num()?;
    table.pager.get_page(new_left_page_num)?;

    let mut new_data = Box::new([0u8; PAGE_SIZE]);
    table.with_node(old_root_page_num, |n| new_data.copy_from_slice(&n.data[..]))?;

    let moved_type = table.with_node_mut(new_left_page_num, move |n| {
        *n = Node::from_bytes(new_data);
        n.set_is_root(false);
        n.set_parent(root_page_num);
        n.node_type()
    })??;

    if moved_type == NodeType::Internal {
        let children = table.with_node(new_left_page_num, |n| {
            let num_keys = n.internal_num_keys() as usize;
            let mut kids: Vec<u32> = (0..num_keys).map(|i| n.internal_child(i)).collect();
            kids.push(n.internal_right_child());
            kids
        })?;
        for child in children {
            set_node_parent(table, child, new_left_page_num)?;
        }
    }

    let left_max_key = node_max_key(table, new_left_page_num)?;
    set_node_parent(table, right_child_page_num, root_page_num)?;

    table.with_node_mut(root_page_num, |n| {
        n.initialize_internal();
        n.set_is_root(true);
        n.set_parent(0);
        n.set_internal_num_keys(1);
        n.set_internal_child(0, new_left_page_num);
        n.set_internal_key(0, left_max_key);
        n.set_internal_right_child(right_child_page_num);
    })?;

    Ok(())
}

fn internal_update_child_key(table: &mut Table, parent_page_num: u32, child_page_num: u32, new_key: u32) -> Result<(), Error> {
    table.with_node_mut(parent_page_num, |n| {
        let num_keys = n.internal_num_keys() as usize;
        for i in 0..num_keys {
            if n.internal_child(i) == child_page_num {
                n.set_internal_key(i, new_key);
                return;
            }
        }
        // otherwise `child_page_num` is the rightmost child: no stored key to update
    })
}

/// The max key in `page_num`'s subtree: the last cell of a leaf, or
/// (recursively) the max key of an internal node's rightmost child.
fn node_max_key(table: &mut Table, page_num: u32) -> Result<u32, Error> {
    match table.node_type(page_num)? {
        NodeType::Leaf => table.with_node(page_num, |n| {
            let num = n.leaf_num_cells() as usize;
            if num == 0 { 0 } else { n.leaf_key(num - 1) }
        }),
        NodeType::Internal => {
            let right_child = table.with_node(page_num, |n| n.internal_right_child())?;
            node_max_key(table, right_child)
        }
    }
}

fn set_node_parent(table: &mut Table, page_num: u32, parent: u32) -> Result<(), Error> {
    table.with_node_mut(page_num, |n| n.set_parent(parent))
}

/// Recursively validate the invariants in SPEC_FULL.md §4.5: sorted
/// ordering within every node, children bounded by their separator keys,
/// and the leaf chain visiting every leaf once in ascending order.
#[cfg(test)]
pub(crate) fn check_invariants(table: &mut Table) -> Result<(), Error> {
    check_subtree(table, table.root_page_num, None, None)?;
    check_leaf_chain(table)
}

#[cfg(test)]
fn check_subtree(table: &mut Table, page_num: u32, lower: Option<u32>, upper: Option<u32>) -> Result<(), Error> {
    match table.node_type(page_num)? {
        NodeType::Leaf => {
            let num_cells = table.with_node(page_num, |n| n.leaf_num_cells() as usize)?;
            let mut prev: Option<u32> = None;
            for i in 0..num_cells {
                let key = table.with_node(page_num, |n| n.leaf_key(i))?;
                if let Some(p) = prev {
                    assert!(key > p, "leaf keys must be strictly increasing");
                }
                if let Some(lo) = lower {
                    assert!(key > lo, "leaf key {} must exceed lower bound {}", key, lo);
                }
                if let Some(hi) = upper {
                    assert!(key <= hi, "leaf key {} must not exceed upper bound {}", key, hi);
                }
                prev = Some(key);
            }
            Ok(())
        }
        NodeType::Internal => {
            let num_keys = table.with_node(page_num, |n| n.internal_num_keys() as usize)?;
            let mut prev_key: Option<u32> = None;
            let mut lo = lower;
            for i in 0..num_keys {
                let (child, key) = table.with_node(page_num, |n| (n.internal_child(i), n.internal_key(i)))?;
                if let Some(p) = prev_key {
                    assert!(key > p, "internal keys must be strictly increasing");
                }
                check_subtree(table, child, lo, Some(key))?;
                lo = Some(key);
                prev_key = Some(key);
            }
            let right_child = table.with_node(page_num, |n| n.internal_right_child())?;
            check_subtree(table, right_child, lo, upper)
        }
    }
}

#[cfg(test)]
fn check_leaf_chain(table: &mut Table) -> Result<(), Error> {
    let mut page_num = {
        let mut p = table.root_page_num;
        loop {
            match table.node_type(p)? {
                NodeType::Leaf => break p,
                NodeType::Internal => {
                    p = table.with_node(p, |n| {
                        if n.internal_num_keys() > 0 { n.internal_child(0) } else { n.internal_right_child() }
                    })?;
                }
            }
        }
    };
    let mut prev_max: Option<u32> = None;
    loop {
        let (num_cells, next) = table.with_node(page_num, |n| (n.leaf_num_cells() as usize, n.leaf_next_leaf()))?;
        if num_cells > 0 {
            let first = table.with_node(page_num, |n| n.leaf_key(0))?;
            if let Some(p) = prev_max {
                assert!(first > p, "leaf chain must be in strictly ascending order across pages");
            }
            prev_max = Some(table.with_node(page_num, |n| n.leaf_key(num_cells - 1))?);
        }
        if next == 0 {
            break;
        }
        page_num = next;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn open_tmp() -> (NamedTempFile, Table) {
        let tmp = NamedTempFile::new().unwrap();
        let table = Table::open(tmp.path()).unwrap();
        (tmp, table)
    }

    fn row(id: u32) -> Row {
        Row::new(id, format!("user{id}"), format!("user{id}@example.com")).unwrap()
    }

    #[test]
    fn ascending_insert_past_one_leaf_splits_with_separator_seven() {
        let (_tmp, mut table) = open_tmp();
        for id in 1..=14u32 {
            table.insert(&row(id)).unwrap();
            table.check_invariants().unwrap();
        }
        let rows = table.select_all_rows().unwrap();
        assert_eq!(rows.len(), 14);
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), (1..=14).collect::<Vec<_>>());

        let separator = table.with_node(table.root_page_num, |n| n.internal_key(0)).unwrap();
        assert_eq!(separator, 7);
    }

    #[test]
    fn descending_insert_produces_same_rows_as_ascending() {
        let (_tmp, mut table) = open_tmp();
        for id in (1..=14u32).rev() {
            table.insert(&row(id)).unwrap();
            table.check_invariants().unwrap();
        }
        let rows = table.select_all_rows().unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), (1..=14).collect::<Vec<_>>());
    }

    #[test]
    fn duplicate_key_is_rejected_without_mutating_table() {
        let (_tmp, mut table) = open_tmp();
        table.insert(&row(5)).unwrap();
        let err = table.insert(&row(5)).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(5)));
        assert_eq!(table.select_all_rows().unwrap().len(), 1);
    }

    #[test]
    fn thirty_inserts_hold_invariants_after_every_insert() {
        let (_tmp, mut table) = open_tmp();
        for id in 1..=30u32 {
            table.insert(&row(id)).unwrap();
            table.check_invariants().unwrap();
        }
        let rows = table.select_all_rows().unwrap();
        assert_eq!(rows.len(), 30);
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), (1..=30).collect::<Vec<_>>());
    }

    #[test]
    fn shuffled_insert_order_still_yields_sorted_scan() {
        let (_tmp, mut table) = open_tmp();
        let order = [13, 1, 7, 20, 4, 2, 25, 9, 11, 3, 30, 17, 6, 22, 15];
        for &id in &order {
            table.insert(&row(id)).unwrap();
            table.check_invariants().unwrap();
        }
        let rows = table.select_all_rows().unwrap();
        let mut sorted_order = order.to_vec();
        sorted_order.sort_unstable();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), sorted_order);
    }
}
