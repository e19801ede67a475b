//! One-line batch summaries for logs.

use tagsync_types::{ActivityTypeRecord, TagRecord};

/// Batches longer than this are shown as `first, ... , last`.
const MAX_LISTED: usize = 5;

/// `Synced 2 tag|keyword pairs a|x, b|y`
#[must_use]
pub fn format_tags(records: &[TagRecord]) -> String {
    let items: Vec<String> = records
        .iter()
        .map(|r| format!("{}|{}", r.tag_name, r.keyword))
        .collect();
    let noun = if records.len() == 1 { "pair" } else { "pairs" };
    format!(
        "Synced {} tag|keyword {noun} {}",
        records.len(),
        ellipsize(&items)
    )
    .trim()
    .to_string()
}

/// `Synced 3 activity types DEV, QA, OPS`
#[must_use]
pub fn format_activity_types(records: &[ActivityTypeRecord]) -> String {
    let items: Vec<String> = records.iter().map(|r| r.code.clone()).collect();
    let noun = if records.len() == 1 {
        "activity type"
    } else {
        "activity types"
    };
    format!("Synced {} {noun} {}", records.len(), ellipsize(&items))
        .trim()
        .to_string()
}

fn ellipsize(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        _ if items.len() <= MAX_LISTED => items.join(", "),
        [first, .., last] => format!("{first}, ... , {last}"),
    }
}
