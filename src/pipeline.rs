use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::browser::chrome::ChromeSession;
use crate::browser::stabilize::ensure_page_loaded;
use crate::browser::BrowserSession;
use crate::error::ScrapeError;
use crate::fetch::{fetch_page, RetryPolicy};
use crate::parser;
use crate::parser::walk::{collect_headings, numbered_questions, walk_questions, Outcome};
use crate::settings::Settings;
use crate::table::QaTable;

/// Which acquirer/segmenter pair to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Static,
    Dynamic,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Static => "static",
            Mode::Dynamic => "dynamic",
        }
    }
}

/// Table produced by one run plus how many questions were skipped.
#[derive(Debug)]
pub struct RunOutcome {
    pub table: QaTable,
    pub skipped: usize,
}

/// Fetch the page once and segment its blocks heuristically.
pub async fn scrape_static(
    client: &Client,
    url: &str,
    policy: RetryPolicy,
) -> Result<RunOutcome, ScrapeError> {
    let html = fetch_page(client, url, policy).await?;
    let records = parser::process_html(&html);
    info!(url, records = records.len(), "segmented page");
    Ok(RunOutcome {
        table: records.into(),
        skipped: 0,
    })
}

#[derive(Debug, Clone)]
pub struct DynamicOptions {
    pub question_tag: String,
    pub settle: Duration,
    pub max_scroll_cycles: u32,
    pub start_from: usize,
}

impl DynamicOptions {
    pub fn from_settings(settings: &Settings, start_from: usize) -> Self {
        Self {
            question_tag: settings.question_tag.clone(),
            settle: Duration::from_millis(settings.settle_ms),
            max_scroll_cycles: settings.max_scroll_cycles,
            start_from,
        }
    }
}

/// Load the page fully, list its numbered questions and walk each answer.
pub async fn scrape_dynamic<S, F>(
    session: &S,
    url: &str,
    opts: &DynamicOptions,
    on_done: F,
) -> Result<RunOutcome, ScrapeError>
where
    S: BrowserSession + ?Sized,
    F: FnMut(usize, &Outcome),
{
    session.navigate(url).await?;
    let loaded = ensure_page_loaded(session, opts.settle, opts.max_scroll_cycles).await?;
    info!(
        url,
        cycles = loaded.cycles,
        height = loaded.height,
        fixed_point = loaded.reached_fixed_point,
        "page loaded"
    );

    let headings = collect_headings(session, &opts.question_tag).await?;
    let questions = numbered_questions(&headings);
    info!(
        url,
        questions = questions.len(),
        start_from = opts.start_from,
        "found questions"
    );

    let tag = opts.question_tag.as_str();
    let report =
        walk_questions(session, tag, &headings, &questions, opts.start_from, on_done).await;
    Ok(RunOutcome {
        skipped: report.skipped.len(),
        table: report.records.into(),
    })
}

/// Run [`scrape_dynamic`] and close the session whatever the result.
pub async fn scrape_with_session<S, F>(
    session: &S,
    url: &str,
    opts: &DynamicOptions,
    on_done: F,
) -> Result<RunOutcome, ScrapeError>
where
    S: BrowserSession + ?Sized,
    F: FnMut(usize, &Outcome),
{
    let result = scrape_dynamic(session, url, opts, on_done).await;
    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {}", e);
    }
    result
}

/// Launch headless Chrome and scrape `url` with it.
pub async fn scrape_in_chrome<F>(
    url: &str,
    opts: &DynamicOptions,
    on_done: F,
) -> Result<RunOutcome, ScrapeError>
where
    F: FnMut(usize, &Outcome),
{
    let session = ChromeSession::launch().await?;
    scrape_with_session(&session, url, opts, on_done).await
}
