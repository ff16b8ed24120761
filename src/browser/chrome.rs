use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use tracing::{debug, info};

use super::{BrowserSession, NodeRef};
use crate::error::ScrapeError;

// Page-side registry of element handles. Each capability is a single
// Runtime.evaluate; handles are indices into `window.__qaNodes`. An element
// gets one slot for the life of the document, so the registry is bounded by
// the elements touched and starts empty after every navigation.
const REGISTRY: &str = "(window.__qaNodes || [])";
const INTERN: &str = "const r = (window.__qaNodes = window.__qaNodes || []); \
    const ids = (window.__qaIds = window.__qaIds || new Map()); \
    const intern = n => { let i = ids.get(n); \
    if (i === undefined) { i = r.push(n) - 1; ids.set(n, i); } return i; };";

/// Headless Chrome session holding one tab.
pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    tab: Arc<Tab>,
}

impl ChromeSession {
    pub async fn launch() -> Result<Self, ScrapeError> {
        let session = tokio::task::spawn_blocking(|| {
            let browser = Browser::new(LaunchOptions {
                headless: true,
                ..Default::default()
            })
            .map_err(browser_err)?;
            let tab = browser.new_tab().map_err(browser_err)?;
            Ok::<_, ScrapeError>(ChromeSession {
                browser: Mutex::new(Some(browser)),
                tab,
            })
        })
        .await
        .map_err(|e| ScrapeError::Browser(e.to_string()))??;
        info!("Launched headless Chrome");
        Ok(session)
    }

    async fn eval(&self, expression: String) -> Result<Option<Value>, ScrapeError> {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || {
            tab.evaluate(&expression, false)
                .map(|obj| obj.value)
                .map_err(browser_err)
        })
        .await
        .map_err(|e| ScrapeError::Browser(e.to_string()))?
    }

    async fn eval_node_string(&self, node: NodeRef, body: &str) -> Result<String, ScrapeError> {
        let expr = format!(
            "(() => {{ const n = {}[{}]; return n ? {} : null; }})()",
            REGISTRY, node.0, body
        );
        match self.eval(expr).await? {
            Some(Value::String(s)) => Ok(s),
            _ => Err(ScrapeError::Browser(format!("stale node handle {}", node.0))),
        }
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            tab.navigate_to(&url).map_err(browser_err)?;
            tab.wait_until_navigated().map_err(browser_err)?;
            Ok::<_, ScrapeError>(())
        })
        .await
        .map_err(|e| ScrapeError::Browser(e.to_string()))??;
        Ok(())
    }

    async fn document_height(&self) -> Result<u64, ScrapeError> {
        let value = self.eval("document.body.scrollHeight".into()).await?;
        value
            .as_ref()
            .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
            .ok_or_else(|| ScrapeError::Browser(format!("unexpected scrollHeight: {:?}", value)))
    }

    async fn scroll_to_bottom(&self) -> Result<(), ScrapeError> {
        self.eval("window.scrollTo(0, document.body.scrollHeight)".into())
            .await?;
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<NodeRef>, ScrapeError> {
        let selector = serde_json::to_string(selector).map_err(browser_err)?;
        let expr = format!(
            "(() => {{ {} return JSON.stringify(\
             Array.from(document.querySelectorAll({})).map(intern)); }})()",
            INTERN, selector
        );
        let raw = match self.eval(expr).await? {
            Some(Value::String(s)) => s,
            other => {
                let message = format!("querySelectorAll returned {:?}", other);
                return Err(ScrapeError::Browser(message));
            }
        };
        let ids: Vec<u64> = serde_json::from_str(&raw).map_err(browser_err)?;
        debug!(count = ids.len(), "query_all");
        Ok(ids.into_iter().map(NodeRef).collect())
    }

    async fn tag_name(&self, node: NodeRef) -> Result<String, ScrapeError> {
        self.eval_node_string(node, "n.tagName.toLowerCase()").await
    }

    async fn inner_text(&self, node: NodeRef) -> Result<String, ScrapeError> {
        self.eval_node_string(node, "(n.innerText || '')").await
    }

    async fn next_sibling(&self, node: NodeRef) -> Result<Option<NodeRef>, ScrapeError> {
        let expr = format!(
            "(() => {{ {} const n = r[{}]; const s = n && n.nextElementSibling; \
             return s ? intern(s) : -1; }})()",
            INTERN, node.0
        );
        match self.eval(expr).await? {
            Some(v) => Ok(v.as_u64().map(NodeRef)),
            None => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        let browser = self
            .browser
            .lock()
            .map_err(|e| ScrapeError::Browser(e.to_string()))?
            .take();
        if let Some(browser) = browser {
            let tab = Arc::clone(&self.tab);
            tokio::task::spawn_blocking(move || {
                let _ = tab.close(true);
                drop(browser);
            })
            .await
            .map_err(|e| ScrapeError::Browser(e.to_string()))?;
            info!("Closed headless Chrome");
        }
        Ok(())
    }
}

fn browser_err(e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Browser(e.to_string())
}
