//! `RocksDB` storage implementation.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use numlease_core::{
    Account, AcquisitionRecord, AcquisitionStatus, EntryId, LedgerEntry, RecordId, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{AccountStore, RecordPatch, RecordStore};

/// RocksDB-backed storage implementing both store traits.
///
/// Row-level exclusive sections are provided by a registry of per-key
/// mutexes created on first use; the registry itself is a concurrent map so
/// lookups on different rows never contend.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    account_locks: DashMap<UserId, Arc<Mutex<()>>>,
    record_locks: DashMap<RecordId, Arc<Mutex<()>>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            account_locks: DashMap::new(),
            record_locks: DashMap::new(),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn account_lock(&self, user_id: &UserId) -> Arc<Mutex<()>> {
        self.account_locks.entry(*user_id).or_default().clone()
    }

    fn record_lock(&self, id: &RecordId) -> Arc<Mutex<()>> {
        self.record_locks.entry(*id).or_default().clone()
    }

    fn guard(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
        lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get_entry(&self, entry_id: &EntryId) -> Result<Option<LedgerEntry>> {
        let cf = self.cf(cf::LEDGER_ENTRIES)?;
        self.db
            .get_cf(&cf, keys::entry_key(entry_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn load_record(&self, id: &RecordId) -> Result<AcquisitionRecord> {
        self.get_record(id)?.ok_or(StoreError::NotFound {
            entity: "record",
            id: id.to_string(),
        })
    }

    /// Collect a user's index keys for `cf_name`, newest first, applying
    /// offset/limit pagination.
    fn paged_user_keys(
        &self,
        cf_name: &str,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let prefix = keys::user_prefix(user_id);

        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }

        // ULID suffixes sort oldest-first; reverse for newest-first.
        all_keys.reverse();
        Ok(all_keys.into_iter().skip(offset).take(limit).collect())
    }
}

impl AccountStore for RocksStore {
    fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(&account.user_id);
        let value = Self::serialize(account)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        self.db
            .get_cf(&cf, keys::account_key(user_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn apply_entry(
        &self,
        user_id: &UserId,
        amount_cents: i64,
        remark: &str,
        record_id: Option<RecordId>,
    ) -> Result<LedgerEntry> {
        let lock = self.account_lock(user_id);
        let _guard = Self::guard(&lock);

        let mut account = self.get_account(user_id)?.ok_or(StoreError::NotFound {
            entity: "account",
            id: user_id.to_string(),
        })?;

        if amount_cents < 0 {
            if !account.is_active() {
                return Err(StoreError::AccountDisabled {
                    user_id: user_id.to_string(),
                });
            }
            if account.balance_cents + amount_cents < 0 {
                return Err(StoreError::InsufficientFunds {
                    balance_cents: account.balance_cents,
                    required_cents: -amount_cents,
                });
            }
        }

        let entry = if amount_cents < 0 {
            LedgerEntry::debit(
                *user_id,
                amount_cents,
                account.balance_cents,
                remark.to_string(),
                record_id,
            )
        } else {
            LedgerEntry::credit(
                *user_id,
                amount_cents,
                account.balance_cents,
                remark.to_string(),
                record_id,
            )
        };

        account.balance_cents = entry.balance_after_cents;
        account.updated_at = chrono::Utc::now();

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_entries = self.cf(cf::LEDGER_ENTRIES)?;
        let cf_by_user = self.cf(cf::LEDGER_BY_USER)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, keys::account_key(user_id), Self::serialize(&account)?);
        batch.put_cf(&cf_entries, keys::entry_key(&entry.id), Self::serialize(&entry)?);
        batch.put_cf(&cf_by_user, keys::user_entry_key(user_id, &entry.id), []);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(
            user_id = %user_id,
            amount_cents = %entry.amount_cents,
            balance_after = %entry.balance_after_cents,
            "Ledger entry written"
        );

        Ok(entry)
    }

    fn list_entries(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let mut entries = Vec::new();
        for key in self.paged_user_keys(cf::LEDGER_BY_USER, user_id, limit, offset)? {
            let entry_id = keys::extract_entry_id(&key);
            if let Some(entry) = self.get_entry(&entry_id)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

impl RecordStore for RocksStore {
    fn create_record(&self, record: &AcquisitionRecord) -> Result<()> {
        let cf_records = self.cf(cf::RECORDS)?;
        let cf_by_user = self.cf(cf::RECORDS_BY_USER)?;
        let cf_pending = self.cf(cf::RECORDS_PENDING)?;

        let key = keys::record_key(&record.id);
        let value = Self::serialize(record)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_records, &key, &value);
        batch.put_cf(&cf_by_user, keys::user_record_key(&record.user_id, &record.id), []);
        batch.put_cf(&cf_pending, &key, []);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_record(&self, id: &RecordId) -> Result<Option<AcquisitionRecord>> {
        let cf = self.cf(cf::RECORDS)?;
        self.db
            .get_cf(&cf, keys::record_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn update_status(
        &self,
        id: &RecordId,
        expected: &[AcquisitionStatus],
        new: AcquisitionStatus,
        patch: RecordPatch,
    ) -> Result<bool> {
        let lock = self.record_lock(id);
        let _guard = Self::guard(&lock);

        let mut record = self.load_record(id)?;
        if !expected.contains(&record.status) {
            return Ok(false);
        }

        record.status = new;
        if let Some(code) = patch.code {
            record.code = Some(code);
        }
        if record.polling_started_at.is_none() {
            record.polling_started_at = patch.polling_started_at;
        }
        if let Some(resolved_at) = patch.resolved_at {
            record.resolved_at = Some(resolved_at);
        }

        let cf_records = self.cf(cf::RECORDS)?;
        let key = keys::record_key(id);

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_records, &key, Self::serialize(&record)?);
        if new.is_terminal() {
            let cf_pending = self.cf(cf::RECORDS_PENDING)?;
            batch.delete_cf(&cf_pending, &key);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    fn clear_charged(&self, id: &RecordId) -> Result<bool> {
        let lock = self.record_lock(id);
        let _guard = Self::guard(&lock);

        let mut record = self.load_record(id)?;
        if !record.charged {
            return Ok(false);
        }

        record.charged = false;

        let cf_records = self.cf(cf::RECORDS)?;
        self.db
            .put_cf(&cf_records, keys::record_key(id), Self::serialize(&record)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    fn scan_pending(
        &self,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<AcquisitionRecord>> {
        let cf_pending = self.cf(cf::RECORDS_PENDING)?;

        let start = after.map(|id| keys::record_key(&id));
        let mode = match &start {
            Some(key) => IteratorMode::From(key, Direction::Forward),
            None => IteratorMode::Start,
        };

        let mut ids = Vec::new();
        for item in self.db.iterator_cf(&cf_pending, mode) {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            // The cursor is exclusive.
            if start.as_deref() == Some(key.as_ref()) {
                continue;
            }
            ids.push(keys::decode_pending_key(&key));
            if ids.len() >= limit {
                break;
            }
        }

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            // A record can go terminal between the index read and the row
            // read; callers treat terminal rows as no-ops, so the stale
            // read is benign.
            if let Some(record) = self.get_record(&id)? {
                records.push(record);
            }
        }

        Ok(records)
    }

    fn list_records_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AcquisitionRecord>> {
        let mut records = Vec::new();
        for key in self.paged_user_keys(cf::RECORDS_BY_USER, user_id, limit, offset)? {
            let record_id = keys::extract_record_id(&key);
            if let Some(record) = self.get_record(&record_id)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numlease_core::{AccountStatus, LineId, ProjectId};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn funded_account(store: &RocksStore, balance_cents: i64) -> UserId {
        let user_id = UserId::generate();
        let mut account = Account::new(user_id);
        account.balance_cents = balance_cents;
        store.put_account(&account).unwrap();
        user_id
    }

    fn pending_record(user_id: UserId) -> AcquisitionRecord {
        AcquisitionRecord::pending(
            RecordId::generate(),
            user_id,
            ProjectId::generate(),
            LineId::generate(),
            "+15550001111".into(),
            "prov-1".into(),
            500,
            10_000,
        )
    }

    #[test]
    fn apply_entry_debit_and_credit() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, 10_000);

        let debit = store
            .apply_entry(&user_id, -500, "acquisition debit", None)
            .unwrap();
        assert_eq!(debit.balance_before_cents, 10_000);
        assert_eq!(debit.balance_after_cents, 9_500);

        let credit = store
            .apply_entry(&user_id, 500, "timeout refund", None)
            .unwrap();
        assert_eq!(credit.balance_after_cents, 10_000);

        let account = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(account.balance_cents, 10_000);
    }

    #[test]
    fn debit_never_goes_negative() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, 300);

        let result = store.apply_entry(&user_id, -500, "acquisition debit", None);
        assert!(matches!(
            result,
            Err(StoreError::InsufficientFunds {
                balance_cents: 300,
                required_cents: 500
            })
        ));

        // Balance unchanged, no entry written.
        let account = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(account.balance_cents, 300);
        assert!(store.list_entries(&user_id, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn disabled_account_refuses_debits_but_takes_credits() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let mut account = Account::new(user_id);
        account.balance_cents = 1_000;
        account.status = AccountStatus::Disabled;
        store.put_account(&account).unwrap();

        let result = store.apply_entry(&user_id, -100, "acquisition debit", None);
        assert!(matches!(result, Err(StoreError::AccountDisabled { .. })));

        let credit = store.apply_entry(&user_id, 100, "refund", None).unwrap();
        assert_eq!(credit.balance_after_cents, 1_100);
    }

    #[test]
    fn apply_entry_unknown_account() {
        let (store, _dir) = create_test_store();
        let result = store.apply_entry(&UserId::generate(), -100, "debit", None);
        assert!(matches!(result, Err(StoreError::NotFound { entity: "account", .. })));
    }

    #[test]
    fn entries_list_newest_first_with_pagination() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, 10_000);

        store.apply_entry(&user_id, -500, "first", None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.apply_entry(&user_id, 500, "second", None).unwrap();

        let entries = store.list_entries(&user_id, 10, 0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].remark, "second");
        assert_eq!(entries[1].remark, "first");

        let page2 = store.list_entries(&user_id, 1, 1).unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].remark, "first");
    }

    #[test]
    fn update_status_applies_only_from_expected() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, 10_000);
        let record = pending_record(user_id);
        store.create_record(&record).unwrap();

        let started = chrono::Utc::now();
        let claimed = store
            .update_status(
                &record.id,
                &[AcquisitionStatus::PendingCode, AcquisitionStatus::InProgress],
                AcquisitionStatus::InProgress,
                RecordPatch {
                    polling_started_at: Some(started),
                    ..RecordPatch::default()
                },
            )
            .unwrap();
        assert!(claimed);

        // A stale resolver expecting PendingCode loses the race.
        let stale = store
            .update_status(
                &record.id,
                &[AcquisitionStatus::PendingCode],
                AcquisitionStatus::InProgress,
                RecordPatch::default(),
            )
            .unwrap();
        assert!(!stale);

        let loaded = store.get_record(&record.id).unwrap().unwrap();
        assert_eq!(loaded.status, AcquisitionStatus::InProgress);
        assert_eq!(loaded.polling_started_at, Some(started));
    }

    #[test]
    fn re_claim_preserves_polling_start() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, 10_000);
        let record = pending_record(user_id);
        store.create_record(&record).unwrap();

        let original = chrono::Utc::now() - chrono::Duration::minutes(2);
        store
            .update_status(
                &record.id,
                &[AcquisitionStatus::PendingCode, AcquisitionStatus::InProgress],
                AcquisitionStatus::InProgress,
                RecordPatch {
                    polling_started_at: Some(original),
                    ..RecordPatch::default()
                },
            )
            .unwrap();

        // A recovery re-claim must not move the deadline.
        store
            .update_status(
                &record.id,
                &[AcquisitionStatus::PendingCode, AcquisitionStatus::InProgress],
                AcquisitionStatus::InProgress,
                RecordPatch {
                    polling_started_at: Some(chrono::Utc::now()),
                    ..RecordPatch::default()
                },
            )
            .unwrap();

        let loaded = store.get_record(&record.id).unwrap().unwrap();
        assert_eq!(loaded.polling_started_at, Some(original));
    }

    #[test]
    fn exactly_one_resolver_reaches_terminal() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, 10_000);
        let record = pending_record(user_id);
        store.create_record(&record).unwrap();

        store
            .update_status(
                &record.id,
                &[AcquisitionStatus::PendingCode, AcquisitionStatus::InProgress],
                AcquisitionStatus::InProgress,
                RecordPatch::default(),
            )
            .unwrap();

        let first = store
            .update_status(
                &record.id,
                &[AcquisitionStatus::InProgress],
                AcquisitionStatus::Timeout,
                RecordPatch {
                    resolved_at: Some(chrono::Utc::now()),
                    ..RecordPatch::default()
                },
            )
            .unwrap();
        let second = store
            .update_status(
                &record.id,
                &[AcquisitionStatus::InProgress],
                AcquisitionStatus::Success,
                RecordPatch::default(),
            )
            .unwrap();

        assert!(first);
        assert!(!second);
        let loaded = store.get_record(&record.id).unwrap().unwrap();
        assert_eq!(loaded.status, AcquisitionStatus::Timeout);
        assert!(loaded.resolved_at.is_some());
    }

    #[test]
    fn clear_charged_wins_once() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, 10_000);
        let record = pending_record(user_id);
        store.create_record(&record).unwrap();

        assert!(store.clear_charged(&record.id).unwrap());
        assert!(!store.clear_charged(&record.id).unwrap());

        let loaded = store.get_record(&record.id).unwrap().unwrap();
        assert!(!loaded.charged);
    }

    #[test]
    fn scan_pending_pages_in_id_order_and_skips_terminal() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, 10_000);

        let mut ids = Vec::new();
        for _ in 0..5 {
            let record = pending_record(user_id);
            store.create_record(&record).unwrap();
            ids.push(record.id);
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        // Resolve the middle record; it must disappear from the scan.
        store
            .update_status(
                &ids[2],
                &[AcquisitionStatus::PendingCode, AcquisitionStatus::InProgress],
                AcquisitionStatus::InProgress,
                RecordPatch::default(),
            )
            .unwrap();
        store
            .update_status(
                &ids[2],
                &[AcquisitionStatus::InProgress],
                AcquisitionStatus::Success,
                RecordPatch::default(),
            )
            .unwrap();

        let first_page = store.scan_pending(None, 2).unwrap();
        assert_eq!(first_page.len(), 2);
        assert_eq!(first_page[0].id, ids[0]);
        assert_eq!(first_page[1].id, ids[1]);

        let second_page = store.scan_pending(Some(ids[1]), 2).unwrap();
        assert_eq!(second_page.len(), 2);
        assert_eq!(second_page[0].id, ids[3]);
        assert_eq!(second_page[1].id, ids[4]);

        let tail = store.scan_pending(Some(ids[4]), 2).unwrap();
        assert!(tail.is_empty());
    }

    #[test]
    fn records_list_by_user_newest_first() {
        let (store, _dir) = create_test_store();
        let user_id = funded_account(&store, 10_000);

        let first = pending_record(user_id);
        store.create_record(&first).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = pending_record(user_id);
        store.create_record(&second).unwrap();

        let records = store.list_records_by_user(&user_id, 10, 0).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, second.id);
        assert_eq!(records[1].id, first.id);
    }
}
