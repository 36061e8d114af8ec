//! Per-item processing of a decoded submission.

use std::sync::Arc;

use crate::analyzer::Analyzer;
use crate::error::ItemError;
use crate::publisher::{PublishReport, Publisher};
use crate::types::SubmissionEvent;

/// Counts for one processed event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs every item of an event through analysis and write-back, in order.
#[derive(Clone)]
pub struct ItemPipeline {
    analyzer: Arc<dyn Analyzer>,
    publisher: Arc<dyn Publisher>,
}

impl ItemPipeline {
    pub fn new(analyzer: Arc<dyn Analyzer>, publisher: Arc<dyn Publisher>) -> Self {
        Self { analyzer, publisher }
    }

    /// Process items sequentially. A failed item is logged and skipped.
    pub async fn process_event(&self, event: &SubmissionEvent) -> EventReport {
        let mut report = EventReport::default();
        tracing::info!(
            tx_hash = %event.transaction_hash,
            submitter = %event.submitter,
            items = event.item_urls.len(),
            "processing submission"
        );

        for item_url in &event.item_urls {
            match self.process_item(item_url, event).await {
                Ok(published) => {
                    report.succeeded += 1;
                    tracing::info!(
                        item_url = %item_url,
                        result_tx = %published.tx_hash,
                        notified = published.notified,
                        "item processed"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        item_url = %item_url,
                        tx_hash = %event.transaction_hash,
                        submitter = %event.submitter,
                        error = %e,
                        "item failed, skipping"
                    );
                }
            }
        }
        report
    }

    async fn process_item(&self, item_url: &str, event: &SubmissionEvent) -> Result<PublishReport, ItemError> {
        let verdict = self.analyzer.analyze(item_url)?;
        tracing::debug!(item_url, verdict = %verdict.verdict_text, "analysis complete");
        let published = self
            .publisher
            .publish(&verdict.item_url, &verdict.verdict_text, event.submitter)
            .await?;
        Ok(published)
    }
}
