use serde::Serialize;

use crate::index::FragmentIndex;
use crate::sync::SelectionState;

/// What the text panel can ask of the highlight controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelIntent {
    FragmentSelected(String),
    ClearSelection,
}

/// One clickable fragment in the panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSpan {
    pub text: String,
    /// Position of the fragment in the index (reading order)
    pub position: usize,
    pub selected: bool,
}

impl PanelSpan {
    /// The intent a click on this span produces
    pub fn intent(&self) -> PanelIntent {
        PanelIntent::FragmentSelected(self.text.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelPage {
    pub page: u32,
    pub spans: Vec<PanelSpan>,
}

/// The panel's view model: fragments grouped by page, ascending
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PanelView {
    pub pages: Vec<PanelPage>,
}

impl PanelView {
    pub fn selected_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|p| &p.spans)
            .filter(|s| s.selected)
            .count()
    }

    /// Find the span at an index position (e.g. from a click handler)
    pub fn span_at(&self, position: usize) -> Option<&PanelSpan> {
        self.pages
            .iter()
            .flat_map(|p| &p.spans)
            .find(|s| s.position == position)
    }

    /// Plain-text rendering: a header per page, selected spans in brackets,
    /// wrapped to `width` columns
    pub fn to_plain_text(&self, width: usize) -> String {
        let mut out = String::new();
        for page in &self.pages {
            out.push_str(&format!("── Page {} ──\n", page.page));
            let line = page
                .spans
                .iter()
                .map(|s| if s.selected { format!("[{}]", s.text) } else { s.text.clone() })
                .collect::<Vec<_>>()
                .join(" ");
            for wrapped in textwrap::wrap(&line, width.max(10)) {
                out.push_str(&wrapped);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

/// Build the panel view for `index` with `selection` marked
pub fn render(index: &FragmentIndex, selection: &SelectionState) -> PanelView {
    let pages = index
        .by_page()
        .into_iter()
        .map(|(page, fragments)| PanelPage {
            page,
            spans: fragments
                .into_iter()
                .map(|(position, f)| PanelSpan {
                    text: f.text.clone(),
                    position,
                    selected: selection.is_selected(&f.text),
                })
                .collect(),
        })
        .collect();

    PanelView { pages }
}
