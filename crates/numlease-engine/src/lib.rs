//! Number-acquisition lifecycle manager for numlease.
//!
//! Turns a paid request into a reserved phone number, waits asynchronously
//! for the externally delivered verification code with a bounded deadline,
//! resolves the transaction to a terminal outcome, and keeps the user's
//! balance and audit ledger consistent under concurrency. A recovery sweep
//! resumes transactions left non-terminal by a crash or redeploy.
//!
//! # Wiring
//!
//! The engine is assembled from collaborator seams:
//!
//! - [`ProviderClient`]: the upstream number provider (protocol elsewhere)
//! - [`PricingResolver`]: what one acquisition costs
//! - [`ProjectCatalog`]: per-project polling parameters
//! - [`StatsSink`]: rolling success statistics
//! - `AccountStore` / `RecordStore`: durable storage (numlease-store)
//!
//! ```no_run
//! use std::sync::Arc;
//! use numlease_engine::{
//!     AccountLedger, AcquisitionOrchestrator, EngineConfig, FixedPricing,
//!     NoopStats, ProviderGateway, RecoverySweeper, StaticCatalog,
//! };
//! use numlease_store::RocksStore;
//!
//! # async fn wire(provider: Arc<dyn numlease_engine::ProviderClient>) {
//! let store = Arc::new(RocksStore::open("/data/numlease").unwrap());
//! let config = EngineConfig::from_env();
//!
//! let orchestrator = Arc::new(AcquisitionOrchestrator::new(
//!     AccountLedger::new(store.clone()),
//!     ProviderGateway::new(provider),
//!     store.clone(),
//!     Arc::new(FixedPricing { price_cents: 500 }),
//!     Arc::new(StaticCatalog::default()),
//!     Arc::new(NoopStats),
//!     config.clone(),
//! ));
//!
//! // Resume whatever the previous process left behind.
//! let sweeper = RecoverySweeper::new(store, orchestrator.clone(), &config);
//! sweeper.run_once().await.unwrap();
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod orchestrator;
pub mod pricing;
pub mod project;
pub mod recovery;
pub mod stats;

pub use config::EngineConfig;
pub use error::{AcquireError, Result};
pub use gateway::{
    CodeOutcome, PhoneReservation, ProviderClient, ProviderClientError, ProviderGateway, Rejection,
};
pub use ledger::AccountLedger;
pub use orchestrator::{AcquisitionOrchestrator, ReserveOutcome};
pub use pricing::{FixedPricing, PricingResolver};
pub use project::{ProjectCatalog, ProjectProfile, StaticCatalog};
pub use recovery::RecoverySweeper;
pub use stats::{NoopStats, StatsSink};
