//! A single in-memory page: a flat byte buffer plus a dirty flag.

/// One page's worth of raw record bytes, mirrored in memory from the backing file.
pub(crate) struct Page {
    pub(crate) bytes: Vec<u8>,
    pub(crate) dirty: bool,
}

impl Page {
    pub(crate) fn zeroed(page_bytes: usize) -> Self {
        Self {
            bytes: vec![0u8; page_bytes],
            dirty: false,
        }
    }
}
