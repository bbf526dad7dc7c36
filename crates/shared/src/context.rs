//! Context accumulation: extracted items and the in-memory store.
//!
//! Items are append-only between explicit clears; the combined document
//! renders them in insertion order.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend_api::FilterStats;

const BANNER_WIDTH: usize = 100;

/// Source a context item was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    GitHub,
    Slack,
    Website,
    Firebase,
    Supabase,
}

impl SourceKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::GitHub => "GitHub",
            SourceKind::Slack => "Slack",
            SourceKind::Website => "Website",
            SourceKind::Firebase => "Firebase",
            SourceKind::Supabase => "Supabase",
        }
    }
}

/// One unit of extracted context.
///
/// `content` is never mutated after creation; display order is the store's
/// insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: Uuid,
    pub kind: SourceKind,
    /// Human-readable source label (repo full name, workspace summary,
    /// domain, project id).
    pub name: String,
    pub content: String,
    pub extracted_at: DateTime<Utc>,
}

impl ContextItem {
    pub fn new(kind: SourceKind, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            content: content.into(),
            extracted_at: Utc::now(),
        }
    }
}

/// Ordered collection of extracted context items.
///
/// Created empty on session start, cleared explicitly or after a successful
/// download-and-filter cycle, never persisted across runs.
#[derive(Debug, Default)]
pub struct ContextStore {
    items: Vec<ContextItem>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the end of the sequence. No deduplication: multiple
    /// extractions from the same source produce multiple items.
    pub fn append(&mut self, item: ContextItem) {
        self.items.push(item);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[ContextItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render all items as one combined document. Pure function of the
    /// stored items and the passed generation timestamp.
    pub fn serialize_combined(&self, generated_at: DateTime<Utc>) -> String {
        self.render(generated_at, "COMBINED CONTEXT FILE", None)
    }

    /// The combined document used when filtering failed: same body, marked
    /// as unfiltered with an explanatory note line.
    pub fn serialize_unfiltered(&self, generated_at: DateTime<Utc>) -> String {
        self.render(
            generated_at,
            "COMBINED CONTEXT FILE (UNFILTERED)",
            Some("Note: Filtering failed, this is raw unfiltered content"),
        )
    }

    fn render(&self, generated_at: DateTime<Utc>, title: &str, note: Option<&str>) -> String {
        let banner = "=".repeat(BANNER_WIDTH);
        let mut out = String::new();
        out.push_str(&banner);
        out.push('\n');
        out.push_str(&format!("{:^width$}\n", title, width = BANNER_WIDTH));
        out.push_str(&banner);
        out.push_str("\n\n");
        out.push_str(&format!("Generated: {}\n", iso(generated_at)));
        out.push_str(&format!("Total Items: {}\n", self.items.len()));
        if let Some(note) = note {
            out.push_str(note);
            out.push('\n');
        }
        out.push('\n');

        for (index, item) in self.items.iter().enumerate() {
            out.push('\n');
            out.push_str(&banner);
            out.push('\n');
            out.push_str(&format!(
                "ITEM {}: {} - {}\n",
                index + 1,
                item.kind.display_name(),
                item.name
            ));
            out.push_str(&format!("Extracted: {}\n", iso(item.extracted_at)));
            out.push_str(&banner);
            out.push_str("\n\n");
            out.push_str(&item.content);
            out.push_str("\n\n");
        }

        out
    }
}

/// Render the filtered artifact: banner, generation metadata, size stats,
/// then the backend-filtered content.
pub fn render_filtered(
    filtered: &str,
    stats: &FilterStats,
    total_items: usize,
    generated_at: DateTime<Utc>,
) -> String {
    let banner = "=".repeat(BANNER_WIDTH);
    let mut out = String::new();
    out.push_str(&banner);
    out.push('\n');
    out.push_str(&format!(
        "{:^width$}\n",
        "FILTERED CONTEXT FILE (Programming & Project Relevant)",
        width = BANNER_WIDTH
    ));
    out.push_str(&banner);
    out.push_str("\n\n");
    out.push_str(&format!("Generated: {}\n", iso(generated_at)));
    out.push_str(&format!("Total Items Processed: {}\n", total_items));
    out.push_str(&format!("Original Size: {} characters\n", stats.original_size));
    out.push_str(&format!("Filtered Size: {} characters\n", stats.filtered_size));
    out.push_str(&format!("Reduction: {}%\n\n", stats.reduction_percent));
    out.push_str(&banner);
    out.push_str("\n\n");
    out.push_str(filtered);
    out
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
