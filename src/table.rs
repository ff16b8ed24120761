use serde::Serialize;

use crate::error::ScrapeError;

/// One extracted (question, answer) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaRecord {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Answer")]
    pub answer: String,
}

impl QaRecord {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Ordered, immutable table of records for one scrape run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QaTable {
    rows: Vec<QaRecord>,
}

impl QaTable {
    pub const COLUMNS: [&'static str; 2] = ["Question", "Answer"];

    pub fn new(rows: Vec<QaRecord>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[QaRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// This table with `head` in front of its rows.
    pub fn preceded_by(self, mut head: Vec<QaRecord>) -> Self {
        head.extend(self.rows);
        Self::new(head)
    }

    /// Header row plus one row per record, no index column.
    pub fn to_csv(&self) -> Result<Vec<u8>, ScrapeError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(Self::COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.into_inner().map_err(|e| ScrapeError::Io(e.into_error()))
    }
}

impl From<Vec<QaRecord>> for QaTable {
    fn from(rows: Vec<QaRecord>) -> Self {
        Self::new(rows)
    }
}
