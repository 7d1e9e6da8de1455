//! Shared test harness: a scripted provider and a fully wired engine over
//! a temporary RocksDB database.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use numlease_core::{Account, AcquisitionRecord, LedgerEntry, LineId, ProjectId, RecordId, UserId};
use numlease_engine::{
    AccountLedger, AcquireError, AcquisitionOrchestrator, CodeOutcome, EngineConfig,
    FixedPricing, NoopStats, PhoneReservation, ProviderClient, ProviderClientError,
    ProviderGateway, ProjectProfile, RecoverySweeper, ReserveOutcome, StaticCatalog,
};
use numlease_store::{AccountStore, RecordStore, RocksStore};

/// Flat test price, in cents.
pub const PRICE_CENTS: i64 = 500;

/// Test project code timeout.
pub const CODE_TIMEOUT: Duration = Duration::from_secs(30);

/// An in-process provider driven by scripted responses.
///
/// Unscripted calls fall back to a numbered reservation (for `reserve`) and
/// `NotYet` (for `poll`), so a test only scripts the interesting steps.
#[derive(Default)]
pub struct ScriptedProvider {
    reserve_script: Mutex<VecDeque<Result<PhoneReservation, ProviderClientError>>>,
    poll_script: Mutex<VecDeque<Result<CodeOutcome, ProviderClientError>>>,
    reserve_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn push_reserve(&self, result: Result<PhoneReservation, ProviderClientError>) {
        self.reserve_script.lock().unwrap().push_back(result);
    }

    pub fn push_poll(&self, result: Result<CodeOutcome, ProviderClientError>) {
        self.poll_script.lock().unwrap().push_back(result);
    }

    pub fn reserve_calls(&self) -> usize {
        self.reserve_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn reserve_number(
        &self,
        _project: &ProjectProfile,
        _line: &LineId,
    ) -> Result<PhoneReservation, ProviderClientError> {
        let n = self.reserve_calls.fetch_add(1, Ordering::SeqCst);
        match self.reserve_script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(PhoneReservation {
                phone_number: format!("+1555000{n:04}"),
                provider_ref: format!("prov-{n}"),
            }),
        }
    }

    async fn poll_code(
        &self,
        _project: &ProjectProfile,
        _provider_ref: &str,
    ) -> Result<CodeOutcome, ProviderClientError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        match self.poll_script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(CodeOutcome::NotYet),
        }
    }
}

/// A wired engine with one account, one project, and one line.
pub struct TestHarness {
    pub store: Arc<RocksStore>,
    pub provider: Arc<ScriptedProvider>,
    pub orchestrator: Arc<AcquisitionOrchestrator>,
    pub ledger: AccountLedger,
    pub config: EngineConfig,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub line_id: LineId,
    _dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());

        let user_id = UserId::generate();
        store.put_account(&Account::new(user_id)).unwrap();

        let project_id = ProjectId::generate();
        let catalog = StaticCatalog::new([ProjectProfile {
            id: project_id,
            name: "wsapp".into(),
            code_timeout: CODE_TIMEOUT,
            poll_interval: None,
        }]);

        let provider = Arc::new(ScriptedProvider::default());
        let ledger = AccountLedger::new(store.clone());

        let orchestrator = Arc::new(AcquisitionOrchestrator::new(
            ledger.clone(),
            ProviderGateway::new(provider.clone()),
            store.clone(),
            Arc::new(FixedPricing {
                price_cents: PRICE_CENTS,
            }),
            Arc::new(catalog),
            Arc::new(NoopStats),
            config.clone(),
        ));

        Self {
            store,
            provider,
            orchestrator,
            ledger,
            config,
            user_id,
            project_id,
            line_id: LineId::generate(),
            _dir: dir,
        }
    }

    /// Credit the account through the ledger, as a real top-up would.
    pub fn fund(&self, amount_cents: i64) {
        self.ledger
            .credit(&self.user_id, amount_cents, "account top-up", None)
            .unwrap();
    }

    pub fn balance(&self) -> i64 {
        self.ledger.balance(&self.user_id).unwrap()
    }

    pub async fn reserve(&self) -> Result<ReserveOutcome, AcquireError> {
        self.orchestrator
            .reserve(self.user_id, self.project_id, self.line_id)
            .await
    }

    pub fn sweeper(&self) -> RecoverySweeper {
        RecoverySweeper::new(self.store.clone(), self.orchestrator.clone(), &self.config)
    }

    /// Spin (on paused test time) until the record reaches a terminal
    /// status.
    pub async fn wait_terminal(&self, record_id: RecordId) -> AcquisitionRecord {
        for _ in 0..2_000 {
            let record = self.store.get_record(&record_id).unwrap().unwrap();
            if record.status.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("record {record_id} never reached a terminal status");
    }

    /// Ledger entries linked to the given record.
    pub fn acquisition_entries(&self, record_id: RecordId) -> Vec<LedgerEntry> {
        self.store
            .list_entries(&self.user_id, usize::MAX, 0)
            .unwrap()
            .into_iter()
            .filter(|entry| entry.record_id == Some(record_id))
            .collect()
    }

    /// Persist an orphaned record the way a crashed process would have left
    /// it: charged, created, and (optionally) claimed by a poller that
    /// started `claimed_ago` in the past but never resolved it.
    pub fn orphan_record(&self, claimed_ago: Option<chrono::Duration>) -> RecordId {
        let record_id = RecordId::generate();
        let debit = self
            .ledger
            .charge(&self.user_id, PRICE_CENTS, "acquisition debit", Some(record_id))
            .unwrap();

        let record = AcquisitionRecord::pending(
            record_id,
            self.user_id,
            self.project_id,
            self.line_id,
            "+15550009999".into(),
            "prov-orphan".into(),
            PRICE_CENTS,
            debit.balance_before_cents,
        );
        self.store.create_record(&record).unwrap();

        if let Some(ago) = claimed_ago {
            use numlease_core::AcquisitionStatus;
            let claimed = self
                .store
                .update_status(
                    &record_id,
                    &[AcquisitionStatus::PendingCode],
                    AcquisitionStatus::InProgress,
                    numlease_store::RecordPatch {
                        polling_started_at: Some(chrono::Utc::now() - ago),
                        ..numlease_store::RecordPatch::default()
                    },
                )
                .unwrap();
            assert!(claimed);
        }

        record_id
    }
}
