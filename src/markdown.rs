//! Display text for the panel: plain fallback, line grouping of extracted
//! words, and clickable word runs over the formatted (markdown) text.

use pulldown_cmark::{Event, Parser, TagEnd};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::{ErrorContext, SyncResult};
use crate::fragment::Fragment;
use crate::index::FragmentIndex;
use crate::sync::SelectionState;

pub const DEFAULT_LINE_TOLERANCE: f64 = 5.0;

/// Reading-order text joined by single spaces
pub fn default_text(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Join words into lines by vertical position.
///
/// A word stays on the current line while its `y0` (rounded to one decimal)
/// is strictly within `tolerance` of the previous word's and the page has not
/// changed.
pub fn group_text_by_lines(fragments: &[Fragment], tolerance: f64) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut last: Option<(u32, f64)> = None;

    for fragment in fragments {
        let y = (fragment.bbox.y0 * 10.0).round() / 10.0;
        let same_line = match last {
            Some((page, prev_y)) => page == fragment.page && (y - prev_y).abs() < tolerance,
            None => true,
        };
        if !same_line && !current.is_empty() {
            lines.push(current.join(" "));
            current.clear();
        }
        current.push(&fragment.text);
        last = Some((fragment.page, y));
    }
    if !current.is_empty() {
        lines.push(current.join(" "));
    }

    debug!(lines = lines.len(), "Grouped fragments into lines");
    lines.join("\n")
}

/// Light cleanup of formatted text
pub fn normalize(content: &str) -> SyncResult<String> {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");

    // Fix multiple spaces
    normalized = Regex::new(r"[ \t]+")
        .with_context("whitespace pattern")?
        .replace_all(&normalized, " ")
        .to_string();

    // Fix excessive blank lines
    normalized = Regex::new(r"\n{3,}")
        .with_context("blank line pattern")?
        .replace_all(&normalized, "\n\n")
        .to_string();

    Ok(normalized
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Word,
    Space,
    Break,
}

/// A piece of formatted text as the panel shows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRun {
    pub text: String,
    pub kind: RunKind,
    /// The word is a known fragment and selecting it highlights something
    pub clickable: bool,
    pub selected: bool,
}

impl TextRun {
    fn space() -> Self {
        Self {
            text: " ".to_string(),
            kind: RunKind::Space,
            clickable: false,
            selected: false,
        }
    }

    fn line_break() -> Self {
        Self {
            text: "\n".to_string(),
            kind: RunKind::Break,
            clickable: false,
            selected: false,
        }
    }
}

/// Split formatted text into word, space and break runs
pub fn text_runs(markdown: &str, index: &FragmentIndex, selection: &SelectionState) -> Vec<TextRun> {
    let mut runs = Vec::new();

    let push_words = |text: &str, runs: &mut Vec<TextRun>| {
        for (i, word) in text.split_whitespace().enumerate() {
            if i > 0 || text.starts_with(char::is_whitespace) {
                runs.push(TextRun::space());
            }
            runs.push(TextRun {
                text: word.to_string(),
                kind: RunKind::Word,
                clickable: index.contains(word),
                selected: selection.is_selected(word),
            });
        }
        if text.ends_with(char::is_whitespace) && !text.trim().is_empty() {
            runs.push(TextRun::space());
        }
    };

    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) | Event::Code(text) => push_words(&text, &mut runs),
            Event::SoftBreak => runs.push(TextRun::space()),
            Event::HardBreak => runs.push(TextRun::line_break()),
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::Item) => {
                runs.push(TextRun::line_break())
            }
            _ => {}
        }
    }

    while runs.last().is_some_and(|r| r.kind != RunKind::Word) {
        runs.pop();
    }
    runs
}
