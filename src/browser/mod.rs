pub mod chrome;
pub mod stabilize;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScrapeError;

/// Opaque handle to a live DOM element, valid for the session that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(pub u64);

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError>;

    async fn document_height(&self) -> Result<u64, ScrapeError>;

    async fn scroll_to_bottom(&self) -> Result<(), ScrapeError>;

    async fn wait(&self, duration: Duration) -> Result<(), ScrapeError> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<NodeRef>, ScrapeError>;

    /// Lowercase tag name.
    async fn tag_name(&self, node: NodeRef) -> Result<String, ScrapeError>;

    async fn inner_text(&self, node: NodeRef) -> Result<String, ScrapeError>;

    /// Next element sibling, `None` at the end of the parent.
    async fn next_sibling(&self, node: NodeRef) -> Result<Option<NodeRef>, ScrapeError>;

    async fn close(&self) -> Result<(), ScrapeError>;
}
