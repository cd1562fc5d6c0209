//! `PagedFileStore`: a fixed-size-record container backed by a single file,
//! organized into fixed-size pages and fronted by a bounded, approximate-LRU
//! page pool (spec §4.1).
//!
//! A record that was never written reads back as the all-zero record
//! ("implicit zero extension"); the backing file is grown lazily, one page
//! at a time, as records past the current end are written.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use schnellru::{ByLength, LruMap};
use tracing::{error, trace};

use rust_eth_triedb_common::{RecordStore, StorageError};

use crate::config::PagedStoreConfig;
use crate::page::Page;

/// A fixed-size-record file, paged in memory through a bounded LRU pool.
///
/// One `PagedFileStore` backs a single node variant's container (spec
/// §4.2 assigns one of these per variant). `REC` is fixed at construction
/// time rather than as a const generic, since the record size of each
/// variant's codec is a runtime property of the typed node pool crate built
/// on top of this one.
pub struct PagedFileStore {
    path: PathBuf,
    file: Mutex<File>,
    record_size: usize,
    records_per_page: u32,
    page_bytes: usize,
    pool: Mutex<LruMap<u32, Page, ByLength>>,
    pool_capacity: u32,
    /// One past the highest index ever written. Not necessarily in sync
    /// with the file's length, since pages are write-back, not write-through.
    size: AtomicU32,
}

impl std::fmt::Debug for PagedFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedFileStore")
            .field("path", &self.path)
            .field("record_size", &self.record_size)
            .field("records_per_page", &self.records_per_page)
            .field("size", &self.size.load(Ordering::Relaxed))
            .finish()
    }
}

impl PagedFileStore {
    /// Opens (creating if missing) a paged store at `path` for records of
    /// `record_size` bytes each.
    pub fn open<P: AsRef<Path>>(
        path: P,
        record_size: usize,
        config: PagedStoreConfig,
    ) -> Result<Self, StorageError> {
        assert!(record_size > 0, "record size must be non-zero");
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let records_per_page = (config.page_size_bytes / record_size).max(1) as u32;
        let page_bytes = records_per_page as usize * record_size;

        let file_len = file.seek(SeekFrom::End(0))?;
        let records_on_disk = (file_len / record_size as u64) as u32;

        trace!(
            target: "pagedstore",
            path = %path.display(),
            record_size,
            records_per_page,
            records_on_disk,
            "opened paged file store"
        );

        Ok(Self {
            path,
            file: Mutex::new(file),
            record_size,
            records_per_page,
            page_bytes,
            pool: Mutex::new(LruMap::new(ByLength::new(config.pool_pages))),
            pool_capacity: config.pool_pages,
            size: AtomicU32::new(records_on_disk),
        })
    }

    /// Returns `(resident pages, pool capacity in pages)`.
    pub fn cache_stats(&self) -> (usize, u32) {
        (self.pool.lock().len(), self.pool_capacity)
    }

    fn page_id(&self, index: u32) -> u32 {
        index / self.records_per_page
    }

    fn offset_in_page(&self, index: u32) -> usize {
        (index % self.records_per_page) as usize * self.record_size
    }

    /// Writes back a single dirty page. Caller holds no lock on `page`.
    fn write_page_to_disk(&self, page_id: u32, page: &Page) -> Result<(), StorageError> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id as u64 * self.page_bytes as u64))?;
        file.write_all(&page.bytes)?;
        Ok(())
    }

    /// Reads a page's bytes from disk, zero-filling any portion past EOF.
    fn read_page_from_disk(&self, page_id: u32) -> Result<Page, StorageError> {
        let mut page = Page::zeroed(self.page_bytes);
        let mut file = self.file.lock();
        let offset = page_id as u64 * self.page_bytes as u64;
        let file_len = file.seek(SeekFrom::End(0))?;
        if offset >= file_len {
            return Ok(page);
        }
        file.seek(SeekFrom::Start(offset))?;
        let readable = ((file_len - offset) as usize).min(self.page_bytes);
        file.read_exact(&mut page.bytes[..readable])?;
        Ok(page)
    }

    /// Ensures `page_id` is resident in the pool, evicting and writing back
    /// the least-recently-used page first if the pool is at capacity.
    ///
    /// `schnellru::LruMap::insert` silently evicts on overflow without
    /// returning what it dropped, so the write-back-before-evict contract is
    /// enforced here, by hand, ahead of the insert.
    fn ensure_resident(&self, page_id: u32) -> Result<(), StorageError> {
        let mut pool = self.pool.lock();
        if pool.peek(&page_id).is_some() {
            return Ok(());
        }
        if pool.len() as u32 >= self.pool_capacity {
            if let Some((evicted_id, evicted_page)) = pool.pop_oldest() {
                if evicted_page.dirty {
                    drop(pool);
                    self.write_page_to_disk(evicted_id, &evicted_page)?;
                    pool = self.pool.lock();
                }
            }
        }
        drop(pool);
        let page = self.read_page_from_disk(page_id)?;
        self.pool.lock().insert(page_id, page);
        Ok(())
    }
}

impl RecordStore for PagedFileStore {
    type Error = StorageError;

    fn get(&self, index: u32) -> Result<Vec<u8>, Self::Error> {
        let page_id = self.page_id(index);
        self.ensure_resident(page_id)?;
        let offset = self.offset_in_page(index);
        let mut pool = self.pool.lock();
        let page = pool
            .get(&page_id)
            .expect("page was just made resident");
        Ok(page.bytes[offset..offset + self.record_size].to_vec())
    }

    fn set(&self, index: u32, record: &[u8]) -> Result<(), Self::Error> {
        assert_eq!(record.len(), self.record_size, "record size mismatch");
        let page_id = self.page_id(index);
        self.ensure_resident(page_id)?;
        let offset = self.offset_in_page(index);
        {
            let mut pool = self.pool.lock();
            let page = pool.get(&page_id).expect("page was just made resident");
            page.bytes[offset..offset + self.record_size].copy_from_slice(record);
            page.dirty = true;
        }
        self.size.fetch_max(index + 1, Ordering::Relaxed);
        Ok(())
    }

    fn size(&self) -> u32 {
        self.size.load(Ordering::Relaxed)
    }

    fn flush(&self) -> Result<(), Self::Error> {
        let dirty: Vec<(u32, Vec<u8>)> = {
            let mut pool = self.pool.lock();
            let mut out = Vec::new();
            for (id, page) in pool.iter_mut() {
                if page.dirty {
                    out.push((*id, page.bytes.clone()));
                    page.dirty = false;
                }
            }
            out
        };
        for (id, bytes) in dirty {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(id as u64 * self.page_bytes as u64))?;
            if let Err(e) = file.write_all(&bytes) {
                error!(target: "pagedstore", path = %self.path.display(), page = id, "flush write failed: {e}");
                return Err(e.into());
            }
        }
        self.file.lock().flush()?;
        Ok(())
    }

    fn close(&self) -> Result<(), Self::Error> {
        self.flush()
    }
}
