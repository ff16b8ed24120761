use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::fetch::{build_client, RetryPolicy};
use crate::pipeline::{self, DynamicOptions, Mode};
use crate::settings::Settings;
use crate::sink::{self, upload_table, BlobStore};

pub const BODY_UPLOADED: &str = "Uploaded";
pub const BODY_NO_DATA: &str = "No data was returned.";
pub const BODY_UPLOAD_FAILED: &str = "Upload failed";

/// Optional per-invocation overrides. Anything missing falls back to settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Event {
    pub url: Option<String>,
    pub mode: Mode,
    pub start_from: usize,
    pub folder: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl Response {
    fn ok(body: &str) -> Self {
        Self {
            status_code: 200,
            body: body.to_string(),
        }
    }
}

/// Always answers 200; the body says whether anything was stored.
pub async fn handler(event: Value, _context: Value, settings: &Settings) -> Response {
    let client = match build_client(settings) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return Response::ok(BODY_NO_DATA);
        }
    };
    let store = sink::from_settings(settings, client.clone());
    handle(event, settings, &client, store.as_ref()).await
}

pub async fn handle(
    event: Value,
    settings: &Settings,
    client: &Client,
    store: &dyn BlobStore,
) -> Response {
    let event: Event = match serde_json::from_value(event) {
        Ok(event) => event,
        Err(e) => {
            error!("Malformed event: {}", e);
            return Response::ok(BODY_NO_DATA);
        }
    };
    let url = event.url.as_deref().unwrap_or(&settings.url);
    let folder = event.folder.as_deref().unwrap_or(&settings.folder);
    let file_name = event.file_name.as_deref().unwrap_or(&settings.file_name);
    info!(url, mode = event.mode.as_str(), "invoked");

    let result = match event.mode {
        Mode::Static => {
            let policy = RetryPolicy::from_settings(settings);
            pipeline::scrape_static(client, url, policy).await
        }
        Mode::Dynamic => {
            let opts = DynamicOptions::from_settings(settings, event.start_from);
            pipeline::scrape_in_chrome(url, &opts, |_, _| {}).await
        }
    };

    let outcome = match result {
        Ok(o) => o,
        Err(e) => {
            error!("Failed to retrieve the webpage: {}", e);
            return Response::ok(BODY_NO_DATA);
        }
    };
    info!(
        records = outcome.table.len(),
        skipped = outcome.skipped,
        "scrape finished"
    );

    if upload_table(store, &outcome.table, folder, file_name).await {
        Response::ok(BODY_UPLOADED)
    } else {
        Response::ok(BODY_UPLOAD_FAILED)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::sink::FsStore;
    use crate::testutil::serve;

    fn settings() -> Settings {
        Settings {
            fetch_retries: 0,
            ..Settings::default()
        }
    }

    fn client() -> Client {
        Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn static_event_uploads_csv() {
        let html = std::fs::read_to_string("tests/fixtures/sql_interview.html").unwrap();
        let (url, _) = serve(vec![(200, html)]).await;
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let event =
            json!({ "url": url, "mode": "static", "folder": "out", "file_name": "sql.csv" });
        let resp = handle(event, &settings(), &client(), &store).await;

        assert_eq!(resp, Response::ok(BODY_UPLOADED));
        let csv = std::fs::read_to_string(dir.path().join("out/sql.csv")).unwrap();
        assert!(csv.starts_with("Question,Answer\n"));
        assert!(csv.contains(
            "1. What is SQL?,SQL (Structured Query Language) is used to query relational databases.\n"
        ));
    }

    #[tokio::test]
    async fn failed_fetch_reports_no_data() {
        let (url, _) = serve(vec![(404, String::new())]).await;
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let resp = handle(json!({ "url": url }), &settings(), &client(), &store).await;

        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.body, BODY_NO_DATA);
        assert!(!dir.path().join("webscraped_generic/gfg.csv").exists());
    }

    #[tokio::test]
    async fn upload_failure_still_200() {
        let (url, _) = serve(vec![(200, "<h2>1. Q</h2><p>A</p>".into())]).await;
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = FsStore::new(&blocker);

        let resp = handle(json!({ "url": url }), &settings(), &client(), &store).await;
        assert_eq!(resp, Response::ok(BODY_UPLOAD_FAILED));
    }

    #[test]
    fn empty_event_uses_defaults() {
        let event: Event = serde_json::from_value(json!({})).unwrap();
        assert_eq!(event.mode, Mode::Static);
        assert!(event.url.is_none());
    }

    #[tokio::test]
    async fn malformed_event_uploads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let events = [json!({ "mode": "Dynamic" }), json!({ "start_from": "x" }), json!("static")];
        for event in events {
            let resp = handle(event, &settings(), &client(), &store).await;
            assert_eq!(resp, Response::ok(BODY_NO_DATA));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn response_shape() {
        let v = serde_json::to_value(Response::ok(BODY_UPLOADED)).unwrap();
        assert_eq!(v, json!({ "statusCode": 200, "body": "Uploaded" }));
    }
}
