//! Key encoding utilities for `RocksDB`.
//!
//! Composite index keys are `user_id (16 bytes) || ulid (16 bytes)`. Since
//! ULID bytes sort by creation time, a prefix scan over a user's index keys
//! yields that user's rows in chronological order.

use numlease_core::{EntryId, RecordId, UserId};

/// Create an account key from a user ID.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a ledger entry key from an entry ID.
#[must_use]
pub fn entry_key(entry_id: &EntryId) -> Vec<u8> {
    entry_id.to_bytes().to_vec()
}

/// Create a user-entry index key.
#[must_use]
pub fn user_entry_key(user_id: &UserId, entry_id: &EntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&entry_id.to_bytes());
    key
}

/// Create a record key from a record ID.
#[must_use]
pub fn record_key(record_id: &RecordId) -> Vec<u8> {
    record_id.to_bytes().to_vec()
}

/// Create a user-record index key.
#[must_use]
pub fn user_record_key(user_id: &UserId, record_id: &RecordId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&record_id.to_bytes());
    key
}

/// Create a prefix for iterating all index keys of a user.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the entry ID from a user-entry index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_entry_id(key: &[u8]) -> EntryId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    EntryId::from_bytes(bytes)
}

/// Extract the record ID from a user-record index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_record_id(key: &[u8]) -> RecordId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    RecordId::from_bytes(bytes)
}

/// Decode a record ID from a pending-index key (16 raw ULID bytes).
///
/// # Panics
///
/// Panics if the key is not at least 16 bytes.
#[must_use]
pub fn decode_pending_key(key: &[u8]) -> RecordId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[..16]);
    RecordId::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_key_length() {
        let key = account_key(&UserId::generate());
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn user_entry_key_format() {
        let user_id = UserId::generate();
        let entry_id = EntryId::generate();
        let key = user_entry_key(&user_id, &entry_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], entry_id.to_bytes());
        assert_eq!(extract_entry_id(&key), entry_id);
    }

    #[test]
    fn user_record_key_roundtrip() {
        let user_id = UserId::generate();
        let record_id = RecordId::generate();
        let key = user_record_key(&user_id, &record_id);
        assert_eq!(extract_record_id(&key), record_id);
    }

    #[test]
    fn pending_key_roundtrip() {
        let record_id = RecordId::generate();
        assert_eq!(decode_pending_key(&record_key(&record_id)), record_id);
    }
}
