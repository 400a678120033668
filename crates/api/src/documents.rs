//! Document search backends.

use async_trait::async_trait;

use fleet_common::Result;
use fleet_orchestrator::{DocumentIndex, DocumentSnippet};

/// Placeholder index used until a real document store is wired in; the
/// engine treats an empty result as "no document context".
pub struct NoopDocumentIndex;

#[async_trait]
impl DocumentIndex for NoopDocumentIndex {
    async fn search(
        &self,
        _agent_id: u32,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<DocumentSnippet>> {
        Ok(Vec::new())
    }
}
