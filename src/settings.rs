use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::ScrapeError;

const CONFIG_FILE: &str = "qa_scraper";
const ENV_PREFIX: &str = "QA";

/// Run-level configuration. Built once per run and passed down explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub url: String,
    pub folder: String,
    pub file_name: String,
    /// Root directory for the filesystem blob store.
    pub store_root: PathBuf,
    /// When set, tables are PUT to `{store_url}/{folder}/{file_name}` instead.
    pub store_url: Option<String>,
    pub store_token: Option<String>,
    pub db_path: PathBuf,
    pub settle_ms: u64,
    /// 0 disables the bound.
    pub max_scroll_cycles: u32,
    /// Bare element name such as `h3`. Used as the selector for question
    /// headings and compared against sibling tag names to end an answer.
    pub question_tag: String,
    pub fetch_retries: u32,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: "https://www.geeksforgeeks.org/sql-interview-questions/".into(),
            folder: "webscraped_generic".into(),
            file_name: "gfg.csv".into(),
            store_root: PathBuf::from("data"),
            store_url: None,
            store_token: None,
            db_path: PathBuf::from("data/qa.sqlite"),
            settle_ms: 1000,
            max_scroll_cycles: 30,
            question_tag: "h3".into(),
            fetch_retries: 3,
            request_timeout_secs: 30,
            user_agent: concat!("qa_scraper/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl Settings {
    /// Defaults, then `qa_scraper.toml` if present, then `QA_*` environment variables.
    pub fn load() -> Result<Self, ScrapeError> {
        let d = Settings::default();
        let settings = Config::builder()
            .set_default("url", d.url)?
            .set_default("folder", d.folder)?
            .set_default("file_name", d.file_name)?
            .set_default("store_root", d.store_root.to_string_lossy().into_owned())?
            .set_default("db_path", d.db_path.to_string_lossy().into_owned())?
            .set_default("settle_ms", d.settle_ms as i64)?
            .set_default("max_scroll_cycles", d.max_scroll_cycles as i64)?
            .set_default("question_tag", d.question_tag)?
            .set_default("fetch_retries", d.fetch_retries as i64)?
            .set_default("request_timeout_secs", d.request_timeout_secs as i64)?
            .set_default("user_agent", d.user_agent)?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        let settings: Settings = settings.try_deserialize()?;
        let tag = &settings.question_tag;
        if !is_bare_tag(tag) {
            let message = format!("question_tag must be a tag name, got {:?}", tag);
            return Err(ConfigError::Message(message).into());
        }
        Ok(settings)
    }
}

fn is_bare_tag(tag: &str) -> bool {
    tag.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && tag.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}
