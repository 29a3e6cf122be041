//! Super-transaction coordinator
//!
//! Owns the lifecycle of one transaction on one database:
//! `unopened -> open -> committed | aborted`. Transitions are serialized
//! behind a mutex. Per-chunk work holds a [`ChunkPermit`]; commit and abort
//! stop handing out permits and wait for the outstanding ones to drop before
//! the terminal request goes out.

use crate::api::{IngestService, TableSpec, TransactionId};
use crate::error::{CliError, Result};
use qingest_workflow::PartitioningParams;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Unopened,
    Open,
    Committed,
    Aborted,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionState::Unopened => "unopened",
            TransactionState::Open => "open",
            TransactionState::Committed => "committed",
            TransactionState::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Commit { build_secondary_index: bool },
    Abort,
}

impl Finish {
    fn verb(self) -> &'static str {
        match self {
            Finish::Commit { .. } => "commit",
            Finish::Abort => "abort",
        }
    }

    fn target(self) -> TransactionState {
        match self {
            Finish::Commit { .. } => TransactionState::Committed,
            Finish::Abort => TransactionState::Aborted,
        }
    }
}

#[derive(Debug)]
struct Ledger {
    state: TransactionState,
    id: Option<TransactionId>,
}

/// Count of outstanding per-chunk requests
#[derive(Debug, Default)]
struct Inflight {
    count: AtomicUsize,
    drained: Notify,
    /// Set while a commit or abort is in progress
    closing: AtomicBool,
}

impl Inflight {
    /// Mark the transaction as closing; `None` if another close holds the mark
    fn begin_closing(&self) -> Option<ClosingGuard<'_>> {
        self.closing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ClosingGuard { closing: &self.closing })
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn acquire(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }

    async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Proof that a per-chunk request may reference the open transaction.
///
/// Counts as outstanding until dropped.
#[derive(Debug)]
pub struct ChunkPermit {
    transaction_id: TransactionId,
    inflight: Arc<Inflight>,
}

impl ChunkPermit {
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }
}

impl Drop for ChunkPermit {
    fn drop(&mut self) {
        self.inflight.release();
    }
}

/// Clears the closing mark when a commit or abort ends, including when its
/// future is dropped mid-wait
#[derive(Debug)]
struct ClosingGuard<'a> {
    closing: &'a AtomicBool,
}

impl Drop for ClosingGuard<'_> {
    fn drop(&mut self) {
        self.closing.store(false, Ordering::Release);
    }
}

pub struct TransactionCoordinator {
    service: Arc<dyn IngestService>,
    database: String,
    ledger: Mutex<Ledger>,
    inflight: Arc<Inflight>,
}

impl TransactionCoordinator {
    pub fn new(service: Arc<dyn IngestService>, database: impl Into<String>) -> Self {
        Self::with_ledger(service, database.into(), TransactionState::Unopened, None)
    }

    /// Adopt a transaction that an earlier process already opened
    pub fn resume(service: Arc<dyn IngestService>, database: impl Into<String>, id: TransactionId) -> Self {
        Self::with_ledger(service, database.into(), TransactionState::Open, Some(id))
    }

    fn with_ledger(
        service: Arc<dyn IngestService>,
        database: String,
        state: TransactionState,
        id: Option<TransactionId>,
    ) -> Self {
        Self {
            service,
            database,
            ledger: Mutex::new(Ledger { state, id }),
            inflight: Arc::new(Inflight::default()),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn service(&self) -> &Arc<dyn IngestService> {
        &self.service
    }

    pub async fn state(&self) -> TransactionState {
        self.ledger.lock().await.state
    }

    pub async fn transaction_id(&self) -> Option<TransactionId> {
        self.ledger.lock().await.id
    }

    /// Per-chunk requests currently in flight
    pub fn outstanding(&self) -> usize {
        self.inflight.count.load(Ordering::Acquire)
    }

    /// Create the database; an "already exists" answer counts as done
    pub async fn create_database(&self, partitioning: &PartitioningParams) -> Result<()> {
        match self.service.create_database(&self.database, partitioning).await {
            Ok(()) => {
                info!(
                    database = %self.database,
                    num_stripes = partitioning.num_stripes,
                    num_sub_stripes = partitioning.num_sub_stripes,
                    overlap = partitioning.overlap,
                    "Created database"
                );
                Ok(())
            },
            Err(e) if e.remote_message().is_some_and(|m| m.contains("already exists")) => {
                warn!(database = %self.database, error = %e, "Database already exists, continuing");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    pub async fn create_table(&self, table: &TableSpec) -> Result<()> {
        if table.database != self.database {
            return Err(CliError::config(format!(
                "table '{}' targets database '{}' but this run ingests into '{}'",
                table.table, table.database, self.database
            )));
        }

        self.service.create_table(table).await?;
        info!(
            database = %self.database,
            table = %table.table,
            columns = table.columns.len(),
            "Created table"
        );
        Ok(())
    }

    /// Open the transaction; allowed once per coordinator
    pub async fn start_transaction(&self) -> Result<TransactionId> {
        let mut ledger = self.ledger.lock().await;

        if ledger.state != TransactionState::Unopened {
            return Err(CliError::TransactionState {
                id: ledger.id.unwrap_or_default(),
                state: ledger.state,
                attempted: "start",
            });
        }

        let id = self.service.start_transaction(&self.database).await?;
        ledger.state = TransactionState::Open;
        ledger.id = Some(id);

        info!(database = %self.database, transaction_id = id, "Started transaction");
        Ok(id)
    }

    /// Register one per-chunk request against the open transaction
    pub async fn begin_chunk_request(&self) -> Result<ChunkPermit> {
        let ledger = self.ledger.lock().await;

        let id = match (ledger.state, ledger.id) {
            (TransactionState::Open, Some(id)) => id,
            (TransactionState::Unopened, _) | (_, None) => {
                return Err(CliError::not_open(format!(
                    "no transaction has been started for database '{}'",
                    self.database
                )))
            },
            (state, Some(id)) => {
                return Err(CliError::TransactionState {
                    id,
                    state,
                    attempted: "send chunk requests to",
                })
            },
        };

        if self.inflight.is_closing() {
            return Err(CliError::not_open(format!(
                "transaction {} is being closed",
                id
            )));
        }

        self.inflight.acquire();
        Ok(ChunkPermit {
            transaction_id: id,
            inflight: Arc::clone(&self.inflight),
        })
    }

    pub async fn commit(&self, build_secondary_index: bool) -> Result<()> {
        self.finish(Finish::Commit {
            build_secondary_index,
        })
        .await
    }

    pub async fn abort(&self) -> Result<()> {
        self.finish(Finish::Abort).await
    }

    async fn finish(&self, finish: Finish) -> Result<()> {
        let (id, closing) = {
            let ledger = self.ledger.lock().await;

            let id = match (ledger.state, ledger.id) {
                (TransactionState::Open, Some(id)) => id,
                (state, Some(id)) if state == finish.target() => {
                    warn!(transaction_id = id, "Transaction already {}, nothing to do", state);
                    return Ok(());
                },
                (TransactionState::Unopened, _) | (_, None) => {
                    return Err(CliError::not_open(format!(
                        "nothing to {} for database '{}'",
                        finish.verb(),
                        self.database
                    )))
                },
                (state, Some(id)) => {
                    return Err(CliError::TransactionState {
                        id,
                        state,
                        attempted: finish.verb(),
                    })
                },
            };

            let Some(closing) = self.inflight.begin_closing() else {
                return Err(CliError::not_open(format!(
                    "transaction {} is already being closed",
                    id
                )));
            };
            (id, closing)
        };

        let outstanding = self.outstanding();
        if outstanding > 0 {
            info!(
                transaction_id = id,
                outstanding, "Waiting for chunk requests before {}",
                finish.verb()
            );
        }
        self.inflight.wait_drained().await;

        let mut ledger = self.ledger.lock().await;
        let result = match finish {
            Finish::Commit {
                build_secondary_index,
            } => {
                self.service
                    .finish_transaction(id, false, build_secondary_index)
                    .await
            },
            Finish::Abort => self.service.finish_transaction(id, true, false).await,
        };

        drop(closing);
        match result {
            Ok(()) => {
                ledger.state = finish.target();
                info!(transaction_id = id, database = %self.database, "Transaction {}", ledger.state);
                Ok(())
            },
            Err(e) => {
                error!(transaction_id = id, error = %e, "Failed to {} transaction", finish.verb());
                Err(e)
            },
        }
    }

    /// Publish the database; refused while a transaction is still open
    pub async fn publish_database(&self, consolidate_secondary_index: bool) -> Result<()> {
        let ledger = self.ledger.lock().await;
        if let (TransactionState::Open, Some(id)) = (ledger.state, ledger.id) {
            return Err(CliError::TransactionState {
                id,
                state: ledger.state,
                attempted: "publish the database of",
            });
        }

        self.service
            .publish_database(&self.database, consolidate_secondary_index)
            .await?;
        info!(database = %self.database, consolidate_secondary_index, "Published database");
        Ok(())
    }
}
