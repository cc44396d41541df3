//! Deal History Use Case

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::application::dto::{HistoryPage, HistoryRequest};
use crate::application::ports::{DealSourcePort, FetchError};
use crate::domain::aggregation::{Group, Totals, group};
use crate::domain::deal::{DealSource, MANAGER_VOLUME_DIVISOR, scale_volumes};
use crate::domain::view::ViewError;
use crate::infrastructure::metrics;

/// Deal history error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// The deals could not be fetched.
    #[error("failed to fetch deals: {0}")]
    FetchFailed(#[from] FetchError),

    /// The view request names an unknown field or an invalid page size.
    #[error(transparent)]
    View(#[from] ViewError),
}

/// Use case for browsing one account's historical deals.
pub struct DealHistoryUseCase<D>
where
    D: DealSourcePort,
{
    deals: Arc<D>,
    source: DealSource,
    volume_divisor: Option<Decimal>,
}

impl<D> DealHistoryUseCase<D>
where
    D: DealSourcePort,
{
    /// Create a new DealHistoryUseCase. Manager volumes are shown in lots.
    pub fn new(deals: Arc<D>, source: DealSource) -> Self {
        let volume_divisor = match source {
            DealSource::Manager => Some(MANAGER_VOLUME_DIVISOR),
            DealSource::Terminal => None,
        };
        Self {
            deals,
            source,
            volume_divisor,
        }
    }

    /// Override the volume divisor; `None` keeps native units.
    #[must_use]
    pub const fn with_volume_divisor(mut self, divisor: Option<Decimal>) -> Self {
        self.volume_divisor = divisor;
        self
    }

    /// Fetch, summarize and page the deals.
    #[tracing::instrument(skip(self, request), fields(source = %self.source, account = %request.account_id))]
    pub async fn execute(&self, request: HistoryRequest) -> Result<HistoryPage, HistoryError> {
        let fetched = match self.deals.fetch_deals(&request.account_id, &request.query).await {
            Ok(deals) => deals,
            Err(e) => {
                metrics::record_fetch_failure(self.source);
                tracing::error!(error = %e, "Deal history fetch failed");
                return Err(e.into());
            }
        };

        let deals = match self.volume_divisor {
            Some(divisor) => scale_volumes(&fetched, divisor),
            None => fetched,
        };

        let summary = group(&deals, &request.group_by);
        let grand_totals = summary
            .iter()
            .fold(Totals::ZERO, |acc, g| acc + *g.totals());

        let detail = select_group(&summary, request.selected.as_deref());
        let members = detail.map_or(&[][..], Group::members);
        let page = request.view.apply(members)?;
        let selected = detail.map(Group::key_label);

        tracing::info!(
            deals = deals.len(),
            groups = summary.len(),
            selected = selected.as_deref().unwrap_or(""),
            page = page.page,
            total_pages = page.total_pages,
            "Deal history loaded"
        );

        Ok(HistoryPage {
            source: self.source,
            summary,
            grand_totals,
            selected,
            deals: page,
        })
    }
}

/// The group labelled `label`, else the first group.
fn select_group<'a>(summary: &'a [Group], label: Option<&str>) -> Option<&'a Group> {
    label
        .and_then(|label| summary.iter().find(|g| g.key_label() == label))
        .or_else(|| summary.first())
}
