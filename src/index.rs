use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::fragment::Fragment;

/// Text → occurrences lookup over one document's fragments.
///
/// Built once per loaded document and never mutated afterwards. Both the text
/// panel and the highlight controller go through this type, so matching rules
/// live in one place: exact string equality, whitespace included.
#[derive(Debug, Clone, Default)]
pub struct FragmentIndex {
    fragments: Vec<Fragment>,
    by_text: HashMap<String, Vec<usize>>,
}

impl FragmentIndex {
    /// Build the index in one pass over the fragments (reading order kept)
    pub fn build(fragments: Vec<Fragment>) -> Self {
        let mut by_text: HashMap<String, Vec<usize>> = HashMap::with_capacity(fragments.len());
        for (position, fragment) in fragments.iter().enumerate() {
            by_text
                .entry(fragment.text.clone())
                .or_default()
                .push(position);
        }

        debug!(
            fragments = fragments.len(),
            distinct = by_text.len(),
            "Built fragment index"
        );

        Self { fragments, by_text }
    }

    /// Every fragment whose text equals `text`, in insertion order.
    /// No match is an empty result, not an error.
    pub fn lookup(&self, text: &str) -> Vec<&Fragment> {
        self.by_text
            .get(text)
            .map(|positions| positions.iter().map(|&p| &self.fragments[p]).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.by_text.contains_key(text)
    }

    /// All fragments in reading order
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn distinct_texts(&self) -> usize {
        self.by_text.len()
    }

    /// Distinct page numbers, ascending
    pub fn pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.fragments.iter().map(|f| f.page).collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    /// Grouped-by-page view: pages ascending, reading order within a page.
    /// Each entry carries its reading-order position.
    pub fn by_page(&self) -> BTreeMap<u32, Vec<(usize, &Fragment)>> {
        let mut pages: BTreeMap<u32, Vec<(usize, &Fragment)>> = BTreeMap::new();
        for (position, fragment) in self.fragments.iter().enumerate() {
            pages.entry(fragment.page).or_default().push((position, fragment));
        }
        pages
    }
}
