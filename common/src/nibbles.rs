//! Hex-nibble path expansion and Ethereum's hex-prefix (compact) encoding.
//!
//! Every trie lookup in this engine walks a 64-nibble path derived from
//! `Keccak256(address)` or `Keccak256(slotKey)` (spec §3, "Address/Key
//! hashing convention"). These helpers convert between the raw 32-byte hash,
//! its nibble expansion, and the compacted on-disk encoding used by
//! extension and leaf nodes (spec §4.4, "hex-prefix compact encoding").

use alloy_primitives::{keccak256, B256};

/// Expands `bytes` into its nibble sequence, one nibble (0..=15) per output byte.
pub fn bytes_to_nibbles(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(b >> 4);
        out.push(b & 0x0f);
    }
    out
}

/// Packs a nibble sequence of even length back into bytes.
///
/// # Panics
/// Panics if `nibbles.len()` is odd.
pub fn nibbles_to_bytes(nibbles: &[u8]) -> Vec<u8> {
    assert_eq!(nibbles.len() % 2, 0, "odd nibble count cannot pack to bytes");
    nibbles.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
}

/// Computes the 64-nibble secure trie path for a raw key (address or storage slot key),
/// applying the Keccak256 secure-hashing transform mandated by spec §3.
pub fn secure_path(raw_key: &[u8]) -> Vec<u8> {
    bytes_to_nibbles(keccak256(raw_key).as_slice())
}

/// Computes the secure-hashed key as a `B256`, without expanding to nibbles.
pub fn secure_hash(raw_key: &[u8]) -> B256 {
    keccak256(raw_key)
}

/// Hex-prefix (compact) encodes a nibble path for on-disk/RLP storage.
///
/// The encoding prepends one header nibble carrying `(odd-length, is-leaf)`
/// and, for even-length input, a zero-padding nibble, then packs everything
/// into bytes. This is the standard Ethereum "compact" encoding.
pub fn hex_to_compact(path: &[u8], is_leaf: bool) -> Vec<u8> {
    let odd = path.len() % 2 == 1;
    let mut nibbles = Vec::with_capacity(path.len() + 2);

    let flag = (if is_leaf { 2u8 } else { 0 }) | (if odd { 1 } else { 0 });
    nibbles.push(flag);
    if !odd {
        nibbles.push(0);
    }
    nibbles.extend_from_slice(path);

    nibbles_to_bytes(&nibbles)
}

/// Decodes a hex-prefix (compact) encoded path, returning `(path, is_leaf)`.
pub fn compact_to_hex(compact: &[u8]) -> (Vec<u8>, bool) {
    let nibbles = bytes_to_nibbles(compact);
    if nibbles.is_empty() {
        return (Vec::new(), false);
    }
    let flag = nibbles[0];
    let is_leaf = flag & 2 != 0;
    let odd = flag & 1 != 0;
    let start = if odd { 1 } else { 2 };
    (nibbles[start..].to_vec(), is_leaf)
}

/// Returns the length of the shared prefix between two nibble slices.
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nibble_round_trip() {
        let bytes = [0x12u8, 0x34, 0xab];
        let nibbles = bytes_to_nibbles(&bytes);
        assert_eq!(nibbles, vec![1, 2, 3, 4, 0xa, 0xb]);
        assert_eq!(nibbles_to_bytes(&nibbles), bytes);
    }

    #[test]
    fn compact_round_trip_even_leaf() {
        let path = vec![1, 2, 3, 4];
        let compact = hex_to_compact(&path, true);
        let (decoded, is_leaf) = compact_to_hex(&compact);
        assert_eq!(decoded, path);
        assert!(is_leaf);
    }

    #[test]
    fn compact_round_trip_odd_extension() {
        let path = vec![5, 0xa, 7];
        let compact = hex_to_compact(&path, false);
        let (decoded, is_leaf) = compact_to_hex(&compact);
        assert_eq!(decoded, path);
        assert!(!is_leaf);
    }

    #[test]
    fn compact_round_trip_empty_path() {
        let path: Vec<u8> = vec![];
        let compact = hex_to_compact(&path, true);
        let (decoded, is_leaf) = compact_to_hex(&compact);
        assert_eq!(decoded, path);
        assert!(is_leaf);
    }

    #[test]
    fn common_prefix() {
        assert_eq!(common_prefix_len(&[1, 2, 3], &[1, 2, 9]), 2);
        assert_eq!(common_prefix_len(&[1, 2], &[1, 2]), 2);
        assert_eq!(common_prefix_len(&[], &[1]), 0);
    }

    #[test]
    fn secure_path_is_64_nibbles() {
        let path = secure_path(&[0u8; 20]);
        assert_eq!(path.len(), 64);
    }
}
