//! No library surface of its own: this crate exists to hold end-to-end
//! smoke tests under `tests/` that exercise the trie database engine
//! through its public API, backed by a real temp-directory `TrieDb`.
