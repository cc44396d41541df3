//! Reconcile Use Case
//!
//! Fetches both sides and the mapping snapshot concurrently, then compares
//! per-instrument totals. A failed deal fetch fails the whole run; an
//! unreadable mapping degrades to an empty one.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use tracing::Instrument;
use uuid::Uuid;

use crate::application::dto::{ReconcileRequest, ReconciliationReport};
use crate::application::ports::{DealQuery, DealSourcePort, FetchError, MappingStorePort};
use crate::domain::deal::{DealSource, MANAGER_VOLUME_DIVISOR, scale_volumes};
use crate::domain::mapping::SymbolMapper;
use crate::domain::reconciliation::{ReportTotals, reconcile};
use crate::infrastructure::metrics::{self, RunOutcome};

/// Reconciliation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// One side's deals could not be fetched.
    #[error("failed to fetch {side} deals: {source}")]
    FetchFailed {
        /// Which side failed.
        side: DealSource,
        /// Underlying fetch error.
        source: FetchError,
    },
}

/// Use case for comparing manager and terminal deals.
pub struct ReconcileUseCase<M, T, S>
where
    M: DealSourcePort,
    T: DealSourcePort,
    S: MappingStorePort,
{
    manager_source: Arc<M>,
    terminal_source: Arc<T>,
    mappings: Arc<S>,
    volume_divisor: Decimal,
}

impl<M, T, S> ReconcileUseCase<M, T, S>
where
    M: DealSourcePort,
    T: DealSourcePort,
    S: MappingStorePort,
{
    /// Create a new ReconcileUseCase with the default manager volume divisor.
    pub fn new(manager_source: Arc<M>, terminal_source: Arc<T>, mappings: Arc<S>) -> Self {
        Self {
            manager_source,
            terminal_source,
            mappings,
            volume_divisor: MANAGER_VOLUME_DIVISOR,
        }
    }

    /// Override the divisor applied to manager volumes.
    #[must_use]
    pub const fn with_volume_divisor(mut self, divisor: Decimal) -> Self {
        self.volume_divisor = divisor;
        self
    }

    /// Execute one reconciliation run.
    pub async fn execute(
        &self,
        request: ReconcileRequest,
    ) -> Result<ReconciliationReport, ReconcileError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "reconcile",
            %run_id,
            manager = %request.accounts.manager,
            terminal = %request.accounts.terminal,
        );
        self.run(run_id, request).instrument(span).await
    }

    async fn run(
        &self,
        run_id: Uuid,
        request: ReconcileRequest,
    ) -> Result<ReconciliationReport, ReconcileError> {
        let started = Instant::now();
        let accounts = &request.accounts;
        let query = DealQuery::all(request.range);

        let manager_fetch = async {
            self.manager_source
                .fetch_deals(&accounts.manager, &query)
                .await
                .map_err(|source| ReconcileError::FetchFailed {
                    side: DealSource::Manager,
                    source,
                })
        };
        let terminal_fetch = async {
            self.terminal_source
                .fetch_deals(&accounts.terminal, &query)
                .await
                .map_err(|source| ReconcileError::FetchFailed {
                    side: DealSource::Terminal,
                    source,
                })
        };
        let mapping_fetch = async {
            match self.mappings.get_mapping(accounts).await {
                Ok(tuples) => Ok::<_, ReconcileError>((tuples, true)),
                Err(e) => {
                    tracing::warn!(error = %e, "Mapping unavailable, reconciling without it");
                    Ok((Vec::new(), false))
                }
            }
        };

        let fetched = tokio::try_join!(manager_fetch, terminal_fetch, mapping_fetch);
        let (manager, terminal, (tuples, mapping_available)) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                let ReconcileError::FetchFailed { side, .. } = &e;
                metrics::record_fetch_failure(*side);
                metrics::record_reconciliation(RunOutcome::Failed, started.elapsed());
                tracing::error!(error = %e, "Reconciliation aborted");
                return Err(e);
            }
        };

        let manager = scale_volumes(&manager, self.volume_divisor);
        let mapper = SymbolMapper::resolve(&tuples, accounts);
        let rows = reconcile(&manager, &terminal, &mapper);
        let totals = ReportTotals::of(&rows);

        metrics::record_reconciliation(RunOutcome::Success, started.elapsed());
        tracing::info!(
            manager_deals = manager.len(),
            terminal_deals = terminal.len(),
            mapped_symbols = mapper.len(),
            rows = rows.len(),
            diff = %totals.diff,
            "Reconciliation complete"
        );

        Ok(ReconciliationReport {
            run_id,
            accounts: request.accounts,
            range: request.range,
            rows,
            totals,
            mapping_available,
            manager_deals: manager,
            terminal_deals: terminal,
            mapper,
        })
    }
}
