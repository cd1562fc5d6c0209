//! The `Update` value object: a block's complete mutation set, its
//! ordering/uniqueness invariant, and its binary wire encoding (spec §4.5).

use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

/// The on-the-wire format version. Bumped whenever the section layout
/// changes; `Update::decode` rejects any other value.
pub const UPDATE_FORMAT_VERSION: u8 = 0;

/// `Check` detected an ordering or duplication violation in one of the six
/// lists (spec §4.5, §8 invariant 8).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CheckError {
    #[error("deletedAccounts is not sorted or contains a duplicate")]
    DeletedAccounts,
    #[error("createdAccounts is not sorted or contains a duplicate")]
    CreatedAccounts,
    #[error("balances is not sorted or contains a duplicate address")]
    Balances,
    #[error("nonces is not sorted or contains a duplicate address")]
    Nonces,
    #[error("codes is not sorted or contains a duplicate address")]
    Codes,
    #[error("slots is not sorted or contains a duplicate (address, key)")]
    Slots,
}

/// A block's complete mutation set (spec §4.5). Every list MUST be sorted
/// ascending (by address, or by `(address, key)` for slots) and free of
/// duplicates; `check` enforces this before `Apply` touches the trie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    pub deleted_accounts: Vec<Address>,
    pub created_accounts: Vec<Address>,
    pub balances: Vec<(Address, U256)>,
    pub nonces: Vec<(Address, u64)>,
    pub codes: Vec<(Address, Vec<u8>)>,
    pub slots: Vec<(Address, B256, B256)>,
}

fn sorted_unique_by<T>(items: &[T], key: impl Fn(&T) -> &[u8]) -> bool {
    items.windows(2).all(|pair| key(&pair[0]) < key(&pair[1]))
}

impl Update {
    pub fn is_empty(&self) -> bool {
        self.deleted_accounts.is_empty()
            && self.created_accounts.is_empty()
            && self.balances.is_empty()
            && self.nonces.is_empty()
            && self.codes.is_empty()
            && self.slots.is_empty()
    }

    /// Enforces ascending order and uniqueness across all six lists,
    /// returning the first violation found (spec §4.5, §8 invariant 8).
    pub fn check(&self) -> Result<(), CheckError> {
        if !sorted_unique_by(&self.deleted_accounts, |a| a.as_slice()) {
            return Err(CheckError::DeletedAccounts);
        }
        if !sorted_unique_by(&self.created_accounts, |a| a.as_slice()) {
            return Err(CheckError::CreatedAccounts);
        }
        if !sorted_unique_by(&self.balances, |(a, _)| a.as_slice()) {
            return Err(CheckError::Balances);
        }
        if !sorted_unique_by(&self.nonces, |(a, _)| a.as_slice()) {
            return Err(CheckError::Nonces);
        }
        if !sorted_unique_by(&self.codes, |(a, _)| a.as_slice()) {
            return Err(CheckError::Codes);
        }
        if !self
            .slots
            .windows(2)
            .all(|pair| (pair[0].0, pair[0].1) < (pair[1].0, pair[1].1))
        {
            return Err(CheckError::Slots);
        }
        Ok(())
    }

    /// Serializes to the versioned binary wire format: a 1-byte version
    /// tag, then the six sections in fixed order, each a 2-byte big-endian
    /// item count followed by its items (spec §4.5 "Binary encoding").
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![UPDATE_FORMAT_VERSION];
        encode_section(&mut out, &self.deleted_accounts, |out, a| out.extend_from_slice(a.as_slice()));
        encode_section(&mut out, &self.created_accounts, |out, a| out.extend_from_slice(a.as_slice()));
        encode_section(&mut out, &self.balances, |out, (a, b)| {
            out.extend_from_slice(a.as_slice());
            out.extend_from_slice(&b.to_be_bytes::<32>());
        });
        encode_section(&mut out, &self.nonces, |out, (a, n)| {
            out.extend_from_slice(a.as_slice());
            out.extend_from_slice(&n.to_be_bytes());
        });
        encode_section(&mut out, &self.codes, |out, (a, code)| {
            out.extend_from_slice(a.as_slice());
            out.extend_from_slice(&(code.len() as u32).to_be_bytes());
            out.extend_from_slice(code);
        });
        encode_section(&mut out, &self.slots, |out, (a, k, v)| {
            out.extend_from_slice(a.as_slice());
            out.extend_from_slice(k.as_slice());
            out.extend_from_slice(v.as_slice());
        });
        out
    }

    /// Inverse of [`Self::encode`]. Rejects an unrecognized version tag or
    /// a stream that runs out of bytes mid-section.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor { bytes, pos: 0 };
        let version = cursor.take(1)?[0];
        if version != UPDATE_FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let deleted_accounts = decode_section(&mut cursor, decode_address)?;
        let created_accounts = decode_section(&mut cursor, decode_address)?;
        let balances = decode_section(&mut cursor, |c| {
            Ok((decode_address(c)?, U256::from_be_bytes::<32>(c.take(32)?.try_into().unwrap())))
        })?;
        let nonces = decode_section(&mut cursor, |c| {
            Ok((decode_address(c)?, u64::from_be_bytes(c.take(8)?.try_into().unwrap())))
        })?;
        let codes = decode_section(&mut cursor, |c| {
            let address = decode_address(c)?;
            let len = u32::from_be_bytes(c.take(4)?.try_into().unwrap()) as usize;
            Ok((address, c.take(len)?.to_vec()))
        })?;
        let slots = decode_section(&mut cursor, |c| {
            let address = decode_address(c)?;
            let key = B256::from_slice(c.take(32)?);
            let value = B256::from_slice(c.take(32)?);
            Ok((address, key, value))
        })?;

        if !cursor.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }

        Ok(Update { deleted_accounts, created_accounts, balances, nonces, codes, slots })
    }
}

/// Error decoding an `Update` from the binary wire format.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported update format version {0}")]
    UnsupportedVersion(u8),
    #[error("truncated update stream")]
    Truncated,
    #[error("trailing bytes after the last section")]
    TrailingBytes,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

fn decode_address(cursor: &mut Cursor<'_>) -> Result<Address, DecodeError> {
    Ok(Address::from_slice(cursor.take(20)?))
}

fn encode_section<T>(out: &mut Vec<u8>, items: &[T], mut write_item: impl FnMut(&mut Vec<u8>, &T)) {
    out.extend_from_slice(&(items.len() as u16).to_be_bytes());
    for item in items {
        write_item(out, item);
    }
}

fn decode_section<T>(
    cursor: &mut Cursor<'_>,
    mut read_item: impl FnMut(&mut Cursor<'_>) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    let count = u16::from_be_bytes(cursor.take(2)?.try_into().unwrap()) as usize;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(read_item(cursor)?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn addr(byte: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = byte;
        Address::from(bytes)
    }

    #[test]
    fn empty_update_matches_canonical_digest() {
        let update = Update::default();
        let encoded = update.encode();
        assert_eq!(encoded.len(), 13);
        assert!(encoded.iter().all(|&b| b == 0));

        let digest = Sha256::digest(&encoded);
        assert_eq!(
            hex::encode(digest),
            "dd46c3eebb1884ff3b5258c0a2fc9398e560a29e0780d4b53869b6254aa46a96"
        );
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let update = Update {
            deleted_accounts: vec![addr(0xA1), addr(0xA2)],
            created_accounts: vec![addr(0xB1), addr(0xB2), addr(0xB3)],
            balances: vec![(addr(0xC1), U256::from(1u64)), (addr(0xC2), U256::from(2u64))],
            nonces: vec![(addr(0xD1), 1), (addr(0xD2), 2)],
            codes: vec![
                (addr(0xE1), Vec::new()),
                (addr(0xE2), vec![0x01]),
                (addr(0xE3), vec![0x02, 0x03]),
            ],
            slots: vec![
                (addr(0xF1), B256::repeat_byte(1), B256::repeat_byte(0x11)),
                (addr(0xF2), B256::repeat_byte(2), B256::repeat_byte(0x22)),
                (addr(0xF3), B256::repeat_byte(3), B256::repeat_byte(0x33)),
            ],
        };
        assert!(update.check().is_ok());

        let encoded = update.encode();
        let decoded = Update::decode(&encoded).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn check_rejects_unsorted_deletes() {
        let update = Update { deleted_accounts: vec![addr(2), addr(1)], ..Default::default() };
        assert_eq!(update.check(), Err(CheckError::DeletedAccounts));
    }

    #[test]
    fn check_rejects_duplicate_balance_address() {
        let update = Update {
            balances: vec![(addr(1), U256::from(1u64)), (addr(1), U256::from(2u64))],
            ..Default::default()
        };
        assert_eq!(update.check(), Err(CheckError::Balances));
    }

    #[test]
    fn check_rejects_unsorted_slots() {
        let update = Update {
            slots: vec![
                (addr(1), B256::repeat_byte(2), B256::ZERO),
                (addr(1), B256::repeat_byte(1), B256::ZERO),
            ],
            ..Default::default()
        };
        assert_eq!(update.check(), Err(CheckError::Slots));
    }

    #[test]
    fn decode_rejects_unsupported_version() {
        let err = Update::decode(&[99]).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedVersion(99));
    }

    #[test]
    fn decode_rejects_truncated_stream() {
        let err = Update::decode(&[UPDATE_FORMAT_VERSION, 0, 1]).unwrap_err();
        assert_eq!(err, DecodeError::Truncated);
    }
}
