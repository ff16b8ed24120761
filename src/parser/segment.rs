use std::sync::LazyLock;

use regex::Regex;

use super::blocks::Block;
use crate::table::QaRecord;

static Q_NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Q\.\d+").unwrap());
pub(crate) static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.").unwrap());

/// A block opens a new question if its text is numbered ("Q.7", "12.") or its
/// role is a heading or bold span. Role wins even for text that reads like
/// an answer.
pub fn is_question_marker(block: &Block) -> bool {
    Q_NUM_RE.is_match(&block.text)
        || NUMBERED_RE.is_match(&block.text)
        || block.role.starts_question()
}

/// Accumulates answer text under the most recent question marker.
#[derive(Debug, Default)]
pub struct Segmenter {
    question: Option<String>,
    answer: Vec<String>,
    records: Vec<QaRecord>,
}

impl Segmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) {
        if is_question_marker(&block) {
            self.flush();
            // An empty marker clears the question but leaves pending answer text.
            self.question = Some(block.text).filter(|t| !t.is_empty());
        } else if !block.text.is_empty() {
            self.answer.push(block.text);
        }
    }

    /// Emit the pending pair if both halves are present. Answer text is only
    /// reset when a record is emitted.
    fn flush(&mut self) {
        if self.answer.is_empty() {
            return;
        }
        let Some(question) = &self.question else {
            return;
        };
        let answer = self.answer.join(" ").trim().to_string();
        self.answer.clear();
        if !answer.is_empty() {
            self.records.push(QaRecord::new(question.clone(), answer));
        }
    }

    pub fn finish(mut self) -> Vec<QaRecord> {
        self.flush();
        self.records
    }
}

/// Segment a block stream into question/answer records.
pub fn segment<I>(blocks: I) -> Vec<QaRecord>
where
    I: IntoIterator<Item = Block>,
{
    let mut seg = Segmenter::new();
    for block in blocks {
        seg.push(block);
    }
    seg.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::blocks::Role;

    fn h2(t: &str) -> Block {
        Block::new(Role::Heading(2), t)
    }

    fn p(t: &str) -> Block {
        Block::new(Role::Paragraph, t)
    }

    fn pairs(records: &[QaRecord]) -> Vec<(&str, &str)> {
        records
            .iter()
            .map(|r| (r.question.as_str(), r.answer.as_str()))
            .collect()
    }

    #[test]
    fn marker_patterns() {
        assert!(is_question_marker(&p("Q.7 Define normalization")));
        assert!(is_question_marker(&p("12. What is an index?")));
        assert!(is_question_marker(&Block::new(Role::Strong, "Note")));
        assert!(is_question_marker(&h2("")));
        assert!(!is_question_marker(&p("q.7 lowercase")));
        assert!(!is_question_marker(&p("Q7. missing dot position")));
        assert!(!is_question_marker(&p(" 1. leading space")));
        assert!(!is_question_marker(&Block::new(Role::ListItem, "Answer text")));
    }

    #[test]
    fn two_questions_two_answers() {
        let out = segment(vec![
            h2("1. What is SQL?"),
            p("SQL is a query language."),
            h2("2. What is a JOIN?"),
            p("A JOIN combines rows."),
        ]);
        assert_eq!(
            pairs(&out),
            [
                ("1. What is SQL?", "SQL is a query language."),
                ("2. What is a JOIN?", "A JOIN combines rows."),
            ]
        );
    }

    #[test]
    fn question_without_answer_is_dropped() {
        let out = segment(vec![h2("1. Q1"), h2("2. Q2"), p("Answer to Q2")]);
        assert_eq!(pairs(&out), [("2. Q2", "Answer to Q2")]);
    }

    #[test]
    fn no_markers_no_records() {
        let out = segment(vec![
            p("just text"),
            Block::new(Role::ListItem, "a list item"),
            Block::new(Role::Other, "other"),
        ]);
        assert!(out.is_empty());
    }

    #[test]
    fn answer_parts_joined_with_space() {
        let out = segment(vec![
            p("Q.1 Explain ACID"),
            p("Atomicity,"),
            Block::new(Role::ListItem, "Consistency,"),
            p("Isolation, Durability."),
        ]);
        assert_eq!(
            pairs(&out),
            [("Q.1 Explain ACID", "Atomicity, Consistency, Isolation, Durability.")]
        );
    }

    #[test]
    fn empty_blocks_contribute_nothing() {
        let out = segment(vec![h2("1. Q"), p(""), p("A"), p("")]);
        assert_eq!(pairs(&out), [("1. Q", "A")]);
    }

    #[test]
    fn empty_heading_still_flushes() {
        let out = segment(vec![h2("1. Q"), p("A"), h2(""), p("B"), h2("2. R"), p("C")]);
        // "B" sits under an empty heading; it is carried into the next question.
        assert_eq!(pairs(&out), [("1. Q", "A"), ("2. R", "B C")]);
    }

    #[test]
    fn preamble_before_first_question_carries_over() {
        let out = segment(vec![p("Intro text"), h2("1. Q"), p("A")]);
        assert_eq!(pairs(&out), [("1. Q", "Intro text A")]);
    }

    #[test]
    fn bold_inside_answer_overtriggers() {
        let out = segment(vec![
            h2("1. What is a view?"),
            p("A virtual table."),
            Block::new(Role::Strong, "Example"),
            p("CREATE VIEW v AS SELECT 1;"),
        ]);
        assert_eq!(
            pairs(&out),
            [
                ("1. What is a view?", "A virtual table."),
                ("Example", "CREATE VIEW v AS SELECT 1;"),
            ]
        );
    }

    #[test]
    fn one_record_per_answered_marker() {
        let blocks: Vec<Block> = (1..=25)
            .flat_map(|i| vec![h2(&format!("{}. Question", i)), p(&format!("Answer {}", i))])
            .collect();
        let out = segment(blocks.clone());
        assert_eq!(out.len(), 25);
        assert!(out
            .iter()
            .enumerate()
            .all(|(i, r)| r.question == format!("{}. Question", i + 1)));
        assert_eq!(segment(blocks), out);
    }
}
