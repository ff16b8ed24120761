use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use super::segment::NUMBERED_RE;
use crate::browser::{BrowserSession, NodeRef};
use crate::error::{ScrapeError, SkipReason};
use crate::table::QaRecord;

/// Sibling tags whose text belongs to an answer.
const CONTENT_TAGS: &[&str] = &["p", "ul", "ol", "span", "h4", "div"];

pub type Outcome = Result<QaRecord, SkipReason>;

/// A `question_tag` element and its inner text, read once per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub node: NodeRef,
    pub text: String,
}

/// Every `question_tag` element on the page with its trimmed text.
pub async fn collect_headings<S>(
    session: &S,
    question_tag: &str,
) -> Result<Vec<Heading>, ScrapeError>
where
    S: BrowserSession + ?Sized,
{
    let mut headings = Vec::new();
    for node in session.query_all(question_tag).await? {
        let text = session.inner_text(node).await?;
        headings.push(Heading {
            node,
            text: text.trim().to_string(),
        });
    }
    Ok(headings)
}

/// Texts of the headings that start with "<digits>.".
pub fn numbered_questions(headings: &[Heading]) -> Vec<String> {
    headings
        .iter()
        .filter(|h| NUMBERED_RE.is_match(&h.text))
        .map(|h| h.text.clone())
        .collect()
}

/// First heading whose text contains `question`.
fn locate(headings: &[Heading], question: &str) -> Option<NodeRef> {
    headings.iter().find(|h| h.text.contains(question)).map(|h| h.node)
}

/// Locate the question's element and collect the text of following siblings
/// up to the next `question_tag` element.
pub async fn scrape_question<S>(
    session: &S,
    question_tag: &str,
    headings: &[Heading],
    question: &str,
) -> Outcome
where
    S: BrowserSession + ?Sized,
{
    let node = locate(headings, question).ok_or(SkipReason::NotFound)?;

    let mut parts = Vec::new();
    let mut next = session.next_sibling(node).await?;
    while let Some(sibling) = next {
        let tag = session.tag_name(sibling).await?;
        if tag == question_tag {
            break;
        }
        if CONTENT_TAGS.contains(&tag.as_str()) {
            let text = session.inner_text(sibling).await?;
            if !text.trim().is_empty() {
                parts.push(text);
            }
        }
        next = session.next_sibling(sibling).await?;
    }

    let answer = parts.join("\n");
    if answer.is_empty() {
        return Err(SkipReason::EmptyAnswer);
    }
    Ok(QaRecord::new(question, answer))
}

/// Records and skips from one pass over the question list.
#[derive(Debug, Default)]
pub struct WalkReport {
    pub records: Vec<QaRecord>,
    pub skipped: Vec<(usize, String, SkipReason)>,
}

/// Scrape each question from `start_from` on, in page order. A failing
/// question is logged and skipped; `on_done` sees every outcome with its
/// absolute index.
pub async fn walk_questions<S, F>(
    session: &S,
    question_tag: &str,
    headings: &[Heading],
    questions: &[String],
    start_from: usize,
    mut on_done: F,
) -> WalkReport
where
    S: BrowserSession + ?Sized,
    F: FnMut(usize, &Outcome),
{
    let total = questions.len();
    let mut report = WalkReport::default();
    if start_from >= total {
        info!(start_from, total, "nothing left to scrape");
        return report;
    }

    let pb = ProgressBar::new((total - start_from) as u64);
    let template = "[{elapsed_precise}] {bar:40} {pos}/{len} {msg}";
    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        pb.set_style(style.progress_chars("=> "));
    }

    for (idx, question) in questions.iter().enumerate().skip(start_from) {
        info!("Processing question {}/{}: {}", idx + 1, total, question);
        let outcome = scrape_question(session, question_tag, headings, question).await;
        match &outcome {
            Ok(record) => report.records.push(record.clone()),
            Err(reason) => {
                warn!(question = %question, %reason, "skipping question");
                report.skipped.push((idx, question.clone(), reason.clone()));
            }
        }
        on_done(idx, &outcome);
        pb.inc(1);
    }

    pb.finish_and_clear();
    report
}
