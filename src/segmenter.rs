//! Turn segmenter
//!
//! Splits the accumulated text of an assistant turn into a reasoning part
//! and a final answer, delimited by a configurable marker pair.
//!
//! A turn is `AwaitingClose` until the closing marker first appears in the
//! buffer, then `Finalized` for good: the buffer only grows, so a marker
//! once found stays found.

#[cfg(test)]
mod proptests;

use serde::{Deserialize, Serialize};

pub const DEFAULT_OPEN_MARKER: &str = "<think>";
pub const DEFAULT_CLOSE_MARKER: &str = "</think>";

/// Delimiters around the reasoning section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerPair {
    pub open: String,
    pub close: String,
}

impl MarkerPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

impl Default for MarkerPair {
    fn default() -> Self {
        Self::new(DEFAULT_OPEN_MARKER, DEFAULT_CLOSE_MARKER)
    }
}

/// Whether the reasoning section of a turn has been closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    AwaitingClose,
    Finalized,
}

/// Derived view of a turn's buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    /// Text before the closing marker; absent until finalized or when blank
    pub reasoning: Option<String>,
    /// Text after the first closing marker; absent until finalized
    pub final_text: Option<String>,
}

impl Segmentation {
    /// Whether the final answer can be rendered yet
    pub fn is_renderable(&self) -> bool {
        self.final_text.is_some()
    }

    pub fn phase(&self) -> TurnPhase {
        if self.is_renderable() {
            TurnPhase::Finalized
        } else {
            TurnPhase::AwaitingClose
        }
    }
}

/// Segment a buffer from scratch
pub fn segment(raw: &str, markers: &MarkerPair) -> Segmentation {
    match find_close(raw, markers, 0) {
        Some(close_at) => split_at_close(raw, markers, close_at),
        None => Segmentation::default(),
    }
}

/// Segments a growing buffer without rescanning text already searched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentTracker {
    /// Byte offset up to which the buffer has been searched
    scanned: usize,
    /// Byte offset of the first closing marker, once seen
    close_at: Option<usize>,
}

impl SegmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segment `raw`, which must extend the buffer passed on the previous call
    pub fn update(&mut self, raw: &str, markers: &MarkerPair) -> Segmentation {
        if self.close_at.is_none() {
            // Back off so a marker straddling two deltas is still found
            let resume = self
                .scanned
                .saturating_sub(markers.close.len().saturating_sub(1));
            self.close_at = find_close(raw, markers, resume);
            self.scanned = raw.len();
        }

        match self.close_at {
            Some(close_at) => split_at_close(raw, markers, close_at),
            None => Segmentation::default(),
        }
    }

    pub fn phase(&self) -> TurnPhase {
        if self.close_at.is_some() {
            TurnPhase::Finalized
        } else {
            TurnPhase::AwaitingClose
        }
    }
}

/// First occurrence of the closing marker at or after `from`
fn find_close(raw: &str, markers: &MarkerPair, from: usize) -> Option<usize> {
    if markers.close.is_empty() {
        return None;
    }
    let mut start = from.min(raw.len());
    while !raw.is_char_boundary(start) {
        start -= 1;
    }
    raw.get(start..)?.find(&markers.close).map(|pos| start + pos)
}

fn split_at_close(raw: &str, markers: &MarkerPair, close_at: usize) -> Segmentation {
    let before = raw.get(..close_at).unwrap_or_default();
    let after = raw
        .get(close_at + markers.close.len()..)
        .unwrap_or_default();

    let reasoning = before
        .replace("\n\n", "")
        .replacen(markers.open.as_str(), "", 1);

    Segmentation {
        reasoning: non_blank(&reasoning),
        final_text: Some(after.to_string()),
    }
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
