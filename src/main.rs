mod browser;
mod db;
mod error;
mod fetch;
mod handler;
mod parser;
mod pipeline;
mod settings;
mod sink;
mod table;
#[cfg(test)]
mod testutil;

use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::browser::chrome::ChromeSession;
use crate::browser::BrowserSession;
use crate::error::ScrapeError;
use crate::pipeline::{DynamicOptions, Mode, RunOutcome};
use crate::settings::Settings;
use crate::table::{QaRecord, QaTable};

#[derive(Parser)]
#[command(name = "qa_scraper", about = "Interview question/answer scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Target {
    /// Page to scrape (default: QA_URL or config)
    #[arg(long)]
    url: Option<String>,
    /// Destination folder in the blob store
    #[arg(long)]
    folder: Option<String>,
    /// Destination file name
    #[arg(long)]
    file_name: Option<String>,
    /// Print the table but don't upload it
    #[arg(long)]
    no_upload: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch static HTML and segment it heuristically
    Static {
        #[command(flatten)]
        target: Target,
    },
    /// Render the page in headless Chrome and walk each numbered question
    Dynamic {
        #[command(flatten)]
        target: Target,
        /// Skip the first N questions
        #[arg(long, conflicts_with = "resume")]
        start_from: Option<usize>,
        /// Continue from the last checkpoint for this URL
        #[arg(long)]
        resume: bool,
    },
    /// Run the serverless handler with an event read from a file or stdin
    Invoke {
        /// JSON event file (default: stdin)
        event: Option<PathBuf>,
    },
    /// Print the records saved for one run
    Show {
        run_id: i64,
    },
    /// Show recorded runs
    Runs {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;

    let result = match cli.command {
        Commands::Static { target } => {
            let upload = target.apply(&mut settings);
            run(&settings, Mode::Static, 0, false, upload).await
        }
        Commands::Dynamic {
            target,
            start_from,
            resume,
        } => {
            let upload = target.apply(&mut settings);
            run(&settings, Mode::Dynamic, start_from.unwrap_or(0), resume, upload).await
        }
        Commands::Invoke { event } => {
            let raw = match event {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let event: serde_json::Value = if raw.trim().is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&raw)?
            };
            let response = handler::handler(event, serde_json::Value::Null, &settings).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Commands::Show { run_id } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let table = QaTable::new(db::fetch_records(&conn, run_id)?);
            print_table(&table, 0);
            Ok(())
        }
        Commands::Runs { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_runs(&conn, limit)?;
            if rows.is_empty() {
                println!("No runs recorded.");
                return Ok(());
            }
            println!(
                "{:>4} | {:<7} | {:<7} | {:>5} | {:>5} | {:<3} | {:<19} | {}",
                "#", "Mode", "Status", "Rows", "Skip", "Up", "Started", "URL"
            );
            println!("{}", "-".repeat(100));
            for r in &rows {
                println!(
                    "{:>4} | {:<7} | {:<7} | {:>5} | {:>5} | {:<3} | {:<19} | {}",
                    r.id,
                    r.mode,
                    r.status,
                    r.record_count,
                    r.skipped_count,
                    if r.uploaded { "yes" } else { "no" },
                    r.started_at,
                    truncate(&r.url, 60)
                );
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

impl Target {
    /// Fold CLI overrides into settings; returns whether to upload.
    fn apply(self, settings: &mut Settings) -> bool {
        if let Some(url) = self.url {
            settings.url = url;
        }
        if let Some(folder) = self.folder {
            settings.folder = folder;
        }
        if let Some(file_name) = self.file_name {
            settings.file_name = file_name;
        }
        !self.no_upload
    }
}

/// Scrape, record the run in SQLite, print the table and upload it.
async fn run(
    settings: &Settings,
    mode: Mode,
    start_from: usize,
    resume: bool,
    upload: bool,
) -> anyhow::Result<()> {
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let url = settings.url.as_str();
    let run_id = db::start_run(&conn, url, mode.as_str())?;
    let client = fetch::build_client(settings)?;

    let (start_from, carried) = match mode {
        Mode::Dynamic if resume => {
            let next = db::load_checkpoint(&conn, url)?.unwrap_or(0);
            let carried = db::carry_over_records(&conn, url, run_id, next)?;
            info!(url, next, carried = carried.len(), "resuming");
            (next, carried)
        }
        _ => (start_from, Vec::new()),
    };

    let result = match mode {
        Mode::Static => {
            let policy = fetch::RetryPolicy::from_settings(settings);
            pipeline::scrape_static(&client, url, policy).await
        }
        Mode::Dynamic => {
            let opts = DynamicOptions::from_settings(settings, start_from);
            match ChromeSession::launch().await {
                Ok(session) => scrape_resumable(&session, &conn, run_id, url, &opts, carried).await,
                Err(e) => Err(e),
            }
        }
    };

    let RunOutcome { table, skipped } = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            println!("Failed to retrieve the webpage.");
            db::finish_run(
                &conn,
                run_id,
                &db::RunSummary {
                    record_count: 0,
                    skipped_count: 0,
                    uploaded: false,
                    error: Some(e.to_string()),
                },
            )?;
            return Err(e.into());
        }
    };

    match mode {
        Mode::Static => db::save_records(&conn, run_id, table.rows())?,
        Mode::Dynamic => db::clear_checkpoint(&conn, url)?,
    }
    print_table(&table, skipped);

    let uploaded = if upload {
        let store = sink::from_settings(settings, client);
        sink::upload_table(store.as_ref(), &table, &settings.folder, &settings.file_name).await
    } else {
        false
    };

    db::finish_run(
        &conn,
        run_id,
        &db::RunSummary {
            record_count: table.len(),
            skipped_count: skipped,
            uploaded,
            error: None,
        },
    )?;
    Ok(())
}

/// Walk the page from `opts.start_from`, saving each record and the next
/// question index as it completes. `carried` rows lead the returned table.
async fn scrape_resumable<S>(
    session: &S,
    conn: &Connection,
    run_id: i64,
    url: &str,
    opts: &DynamicOptions,
    carried: Vec<QaRecord>,
) -> Result<RunOutcome, ScrapeError>
where
    S: BrowserSession + ?Sized,
{
    let outcome = pipeline::scrape_with_session(session, url, opts, |idx, outcome| {
        if let Ok(record) = outcome {
            if let Err(e) = db::save_record(conn, run_id, idx, record) {
                warn!("Failed to save record {}: {}", idx, e);
            }
        }
        if let Err(e) = db::save_checkpoint(conn, url, idx + 1) {
            warn!("Failed to save checkpoint: {}", e);
        }
    })
    .await?;
    Ok(RunOutcome {
        table: outcome.table.preceded_by(carried),
        skipped: outcome.skipped,
    })
}

fn print_table(table: &QaTable, skipped: usize) {
    if table.is_empty() {
        println!("No rows extracted ({} questions skipped).", skipped);
        return;
    }
    println!("\nFinal table:");
    println!("{:>3} | {:<48} | {:<60}", "#", "Question", "Answer");
    println!("{}", "-".repeat(118));
    for (i, r) in table.rows().iter().enumerate() {
        println!(
            "{:>3} | {:<48} | {:<60}",
            i + 1,
            truncate(&r.question, 48),
            truncate(&r.answer.replace('\n', " / "), 60)
        );
    }
    println!("\n{} rows, {} questions skipped", table.len(), skipped);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
