//! A position within the table, used for full-table scans and as the
//! landing point for an insert.

use crate::error::Error;
use crate::node::NodeType;
use crate::row::ROW_SIZE;
use crate::table::Table;

pub struct Cursor {
    pub page_num: u32,
    pub cell_num: usize,
    pub end_of_table: bool,
}

impl Cursor {
    /// Position at the first row in the table (leftmost leaf, cell 0).
    pub fn table_start(table: &mut Table) -> Result<Self, Error> {
        let page_num = leftmost_leaf(table, table.root_page_num)?;
        let num_cells = table.with_node(page_num, |n| n.leaf_num_cells())?;
        Ok(Cursor { page_num, cell_num: 0, end_of_table: num_cells == 0 })
    }

    /// Descend from the root to the leaf that should contain `key`,
    /// landing on the insertion point (which may already hold `key`, or
    /// may be one past the end of the leaf's cells).
    pub fn find(table: &mut Table, key: u32) -> Result<Self, Error> {
        let leaf_page = find_leaf(table, table.root_page_num, key)?;
        let cell_num = leaf_find(table, leaf_page, key)?;
        Ok(Cursor { page_num: leaf_page, cell_num, end_of_table: false })
    }

    /// Bytes of the row the cursor currently points at.
    pub fn value(&self, table: &mut Table) -> Result<[u8; ROW_SIZE], Error> {
        table.with_node(self.page_num, |n| {
            let mut buf = [0u8; ROW_SIZE];
            buf.copy_from_slice(n.leaf_value(self.cell_num));
            buf
        })
    }

    pub fn advance(&mut self, table: &mut Table) -> Result<(), Error> {
        let (num_cells, next_leaf) =
            table.with_node(self.page_num, |n| (n.leaf_num_cells() as usize, n.leaf_next_leaf()))?;
        self.cell_num += 1;
        if self.cell_num >= num_cells {
            if next_leaf == 0 {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}

fn leftmost_leaf(table: &mut Table, page_num: u32) -> Result<u32, Error> {
    match table.node_type(page_num)? {
        NodeType::Leaf => Ok(page_num),
        NodeType::Internal => {
            let child = table.with_node(page_num, |n| {
                if n.internal_num_keys() > 0 { n.internal_child(0) } else { n.internal_right_child() }
            })?;
            leftmost_leaf(table, child)
        }
    }
}

fn find_leaf(table: &mut Table, page_num: u32, key: u32) -> Result<u32, Error> {
    match table.node_type(page_num)? {
        NodeType::Leaf => Ok(page_num),
        NodeType::Internal => {
            let child = table.with_node(page_num, |n| n.internal_find_child(key))?;
            find_leaf(table, child, key)
        }
    }
}

/// Half-open `[min, max)` binary search for the insertion point of `key`
/// among a leaf's sorted cells.
fn leaf_find(table: &mut Table, page_num: u32, key: u32) -> Result<usize, Error> {
    table.with_node(page_num, |n| {
        let mut min = 0usize;
        let mut max = n.leaf_num_cells() as usize;
        while min < max {
            let mid = min + (max - min) / 2;
            if n.leaf_key(mid) == key {
                return mid;
            }
            if n.leaf_key(mid) < key {
                min = mid + 1;
            } else {
                max = mid;
            }
        }
        min
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;
    use tempfile::NamedTempFile;

    #[test]
    fn table_start_is_end_of_table_when_empty() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        let cursor = Cursor::table_start(&mut table).unwrap();
        assert!(cursor.end_of_table);
    }

    #[test]
    fn find_lands_on_insertion_point() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        table.insert(&Row::new(1, "a", "a@x.com").unwrap()).unwrap();
        table.insert(&Row::new(3, "c", "c@x.com").unwrap()).unwrap();
        let cursor = Cursor::find(&mut table, 2).unwrap();
        assert_eq!(cursor.cell_num, 1);
        let cursor = Cursor::find(&mut table, 1).unwrap();
        assert_eq!(cursor.cell_num, 0);
    }
}
