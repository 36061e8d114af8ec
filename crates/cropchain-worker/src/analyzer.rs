//! Item analysis.

use crate::error::AnalysisError;
use crate::types::AnalysisVerdict;

/// Turns an item reference into a verdict. Must not touch the chain.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, item_url: &str) -> Result<AnalysisVerdict, AnalysisError>;
}

/// Placeholder model: every item is reported safe.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubAnalyzer;

impl Analyzer for StubAnalyzer {
    fn analyze(&self, item_url: &str) -> Result<AnalysisVerdict, AnalysisError> {
        if item_url.is_empty() {
            return Err(AnalysisError {
                item_url: String::new(),
                reason: "empty item url".into(),
            });
        }
        Ok(AnalysisVerdict {
            item_url: item_url.to_string(),
            verdict_text: format!("AI Review:{item_url} is Safe"),
        })
    }
}
