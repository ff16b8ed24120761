pub mod blocks;
pub mod segment;
pub mod walk;

use scraper::Html;

use crate::table::QaRecord;

/// Static pipeline: markup → blocks → records.
pub fn process_html(html: &str) -> Vec<QaRecord> {
    let document = Html::parse_document(html);
    segment::segment(blocks::extract_blocks(&document))
}
