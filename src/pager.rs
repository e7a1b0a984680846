//! Bounded page cache over a single backing file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::error::Error;
use crate::node::{Node, PAGE_SIZE};

pub const TABLE_MAX_PAGES: usize = 100;

pub type PageHandle = Arc<Mutex<Node>>;

pub struct Pager {
    file: File,
    num_pages: u32,
    pages: heapless::Vec<Option<PageHandle>, TABLE_MAX_PAGES>,
}

impl Pager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        let file_length = file.seek(SeekFrom::End(0))?;
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(Error::Fatal(format!(
                "db file length {} is not a multiple of page size {}",
                file_length, PAGE_SIZE
            )));
        }
        let num_pages = (file_length / PAGE_SIZE as u64) as u32;

        let mut pages = heapless::Vec::new();
        for _ in 0..TABLE_MAX_PAGES {
            pages.push(None).ok();
        }

        debug!(num_pages, "opened pager");
        Ok(Pager { file, num_pages, pages })
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// A page number not yet in use. Fails with `TableFull` rather than
    /// handing out a number beyond `TABLE_MAX_PAGES` — the caller's
    /// operation is aborted but the table on disk is untouched.
    pub fn get_unused_page_num(&self) -> Result<u32, Error> {
        if self.num_pages as usize >= TABLE_MAX_PAGES {
            return Err(Error::TableFull);
        }
        Ok(self.num_pages)
    }

    /// Fetch (loading from disk on first touch) the handle for `page_num`.
    /// The handle is shared: mutations made through one clone are visible
    /// through every other clone of the same page while it stays resident.
    pub fn get_page(&mut self, page_num: u32) -> Result<PageHandle, Error> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(Error::Fatal(format!(
                "page number {} exceeds max pages {}",
                page_num, TABLE_MAX_PAGES
            )));
        }

        let slot = &mut self.pages[page_num as usize];
        if slot.is_none() {
            let mut node = Node::zeroed();
            if page_num < self.num_pages {
                self.file.seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.read_exact(&mut node.data[..])?;
                trace!(page_num, "loaded page from disk");
            } else {
                trace!(page_num, "allocated new zeroed page");
            }
            self.pages[page_num as usize] = Some(Arc::new(Mutex::new(node)));
            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }

        Ok(self.pages[page_num as usize].clone().unwrap())
    }

    /// Write a resident page back to disk and evict it from the cache.
    /// A no-op if the slot is already empty.
    pub fn flush(&mut self, page_num: u32) -> Result<(), Error> {
        if page_num as usize >= self.pages.len() {
            return Ok(());
        }
        if let Some(handle) = self.pages[page_num as usize].take() {
            let guard = handle
                .lock()
                .map_err(|_| Error::Fatal("page lock poisoned".into()))?;
            self.file.seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
            self.file.write_all(&guard.data[..])?;
            trace!(page_num, "flushed page to disk");
        }
        Ok(())
    }

    /// Flush every resident page. Called on close.
    pub fn flush_all(&mut self) -> Result<(), Error> {
        for page_num in 0..self.num_pages {
            self.flush(page_num)?;
        }
        self.file.flush()?;
        Ok(())
    }
}
