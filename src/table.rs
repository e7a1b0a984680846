//! The engine façade: open/close a table, insert a row, scan every row.

use std::path::Path;

use tracing::info;

use crate::btree;
use crate::cursor::Cursor;
use crate::error::Error;
use crate::node::{Node, NodeType};
use crate::pager::Pager;
use crate::row::Row;

/// `root_page_num` is always 0 for the table's entire lifetime; splitting
/// the root re-homes its old contents into a freshly allocated page and
/// rewrites page 0 in place as the new internal root (see `btree::create_new_root`).
pub struct Table {
    pub(crate) pager: Pager,
    pub(crate) root_page_num: u32,
}

impl Table {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut pager = Pager::open(path)?;
        if pager.num_pages() == 0 {
            let root = pager.get_page(0)?;
            let mut root = root.lock().map_err(|_| Error::Fatal("page lock poisoned".into()))?;
            root.initialize_leaf();
            root.set_is_root(true);
            info!("initialized empty table");
        }
        Ok(Table { pager, root_page_num: 0 })
    }

    pub fn close(mut self) -> Result<(), Error> {
        self.pager.flush_all()?;
        info!("closed table");
        Ok(())
    }

    pub fn insert(&mut self, row: &Row) -> Result<(), Error> {
        row.validate()?;
        btree::insert(self, row)
    }

    /// Walk every row in ascending key order, handing each to `sink`.
    pub fn select_all<F: FnMut(Row)>(&mut self, mut sink: F) -> Result<(), Error> {
        let mut cursor = Cursor::table_start(self)?;
        loop {
            if cursor.end_of_table {
                break;
            }
            let bytes = cursor.value(self)?;
            let row = Row::decode(&bytes)?;
            sink(row);
            cursor.advance(self)?;
        }
        Ok(())
    }

    pub fn select_all_rows(&mut self) -> Result<Vec<Row>, Error> {
        let mut rows = Vec::new();
        self.select_all(|r| rows.push(r))?;
        Ok(rows)
    }

    /// Validate the structural invariants in SPEC_FULL.md §4.5. Exposed for
    /// tests; not part of normal operation.
    #[cfg(test)]
    pub(crate) fn check_invariants(&mut self) -> Result<(), Error> {
        crate::btree::check_invariants(self)
    }

    pub(crate) fn node_type(&mut self, page_num: u32) -> Result<NodeType, Error> {
        let handle = self.pager.get_page(page_num)?;
        let guard = handle.lock().map_err(|_| Error::Fatal("page lock poisoned".into()))?;
        guard.node_type()
    }

    pub(crate) fn with_node<T>(
        &mut self,
        page_num: u32,
        f: impl FnOnce(&Node) -> T,
    ) -> Result<T, Error> {
        let handle = self.pager.get_page(page_num)?;
        let guard = handle.lock().map_err(|_| Error::Fatal("page lock poisoned".into()))?;
        Ok(f(&guard))
    }

    pub(crate) fn with_node_mut<T>(
        &mut self,
        page_num: u32,
        f: impl FnOnce(&mut Node) -> T,
    ) -> Result<T, Error> {
        let handle = self.pager.get_page(page_num)?;
        let mut guard = handle.lock().map_err(|_| Error::Fatal("page lock poisoned".into()))?;
        Ok(f(&mut guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn open_nonexistent_file_creates_empty_table() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::remove_file(tmp.path()).ok();
        let mut table = Table::open(tmp.path()).unwrap();
        assert_eq!(table.select_all_rows().unwrap(), vec![]);
        table.close().unwrap();
    }

    #[test]
    fn reopen_round_trips_empty_table() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        let table = Table::open(&path).unwrap();
        table.close().unwrap();
        let mut table = Table::open(&path).unwrap();
        assert_eq!(table.select_all_rows().unwrap(), vec![]);
    }
}
