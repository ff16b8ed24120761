use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::browser::{BrowserSession, NodeRef};
use crate::error::ScrapeError;

struct FakeNode {
    tag: String,
    text: String,
}

/// A page whose body is one flat run of sibling elements.
#[derive(Default)]
pub struct FakeSession {
    nodes: Vec<FakeNode>,
    broken: HashSet<usize>,
    heights: Mutex<VecDeque<u64>>,
    last_height: Mutex<u64>,
    scrolls: AtomicU32,
    queries: AtomicU32,
    texts_read: AtomicU32,
    waits: Mutex<Vec<Duration>>,
    closed: AtomicBool,
    fail_navigation: bool,
    navigated: Mutex<Vec<String>>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heights(self, heights: impl IntoIterator<Item = u64>) -> Self {
        *self.heights.lock().unwrap() = heights.into_iter().collect();
        self
    }

    pub fn with_siblings(mut self, nodes: &[(&str, &str)]) -> Self {
        self.nodes = nodes
            .iter()
            .map(|(tag, text)| FakeNode {
                tag: tag.to_string(),
                text: text.to_string(),
            })
            .collect();
        self
    }

    /// Reading the text of this node fails.
    pub fn with_broken(mut self, index: usize) -> Self {
        self.broken.insert(index);
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn scrolls(&self) -> u32 {
        self.scrolls.load(Ordering::SeqCst)
    }

    /// Number of `query_all` calls.
    pub fn queries(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of `inner_text` calls.
    pub fn texts_read(&self) -> u32 {
        self.texts_read.load(Ordering::SeqCst)
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn navigated(&self) -> Vec<String> {
        self.navigated.lock().unwrap().clone()
    }

    fn node(&self, node: NodeRef) -> Result<&FakeNode, ScrapeError> {
        self.nodes
            .get(node.0 as usize)
            .ok_or_else(|| ScrapeError::Browser(format!("stale node handle {}", node.0)))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        if self.fail_navigation {
            let message = format!("net::ERR_NAME_NOT_RESOLVED at {}", url);
            return Err(ScrapeError::Browser(message));
        }
        self.navigated.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn document_height(&self) -> Result<u64, ScrapeError> {
        let mut last = self.last_height.lock().unwrap();
        if let Some(h) = self.heights.lock().unwrap().pop_front() {
            *last = h;
        }
        Ok(*last)
    }

    async fn scroll_to_bottom(&self) -> Result<(), ScrapeError> {
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&self, duration: Duration) -> Result<(), ScrapeError> {
        self.waits.lock().unwrap().push(duration);
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<NodeRef>, ScrapeError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.tag == selector)
            .map(|(i, _)| NodeRef(i as u64))
            .collect())
    }

    async fn tag_name(&self, node: NodeRef) -> Result<String, ScrapeError> {
        Ok(self.node(node)?.tag.clone())
    }

    async fn inner_text(&self, node: NodeRef) -> Result<String, ScrapeError> {
        self.texts_read.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(&(node.0 as usize)) {
            return Err(ScrapeError::Browser("Execution context was destroyed".into()));
        }
        Ok(self.node(node)?.text.clone())
    }

    async fn next_sibling(&self, node: NodeRef) -> Result<Option<NodeRef>, ScrapeError> {
        self.node(node)?;
        let next = node.0 + 1;
        Ok(((next as usize) < self.nodes.len()).then_some(NodeRef(next)))
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Serve exactly `responses.len()` HTTP requests with the given
/// (status, body) pairs, in order. Returns the base URL and a log of the raw
/// requests received.
pub async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let requests = Arc::clone(&log);
    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            requests.lock().unwrap().push(request);
            let reply = format!(
                "HTTP/1.1 {} X\r\ncontent-type: text/html\r\ncontent-length: {}\r\n\
                 connection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(reply.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    (format!("http://{}", addr), log)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&data);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length")
                        .then(|| v.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}
