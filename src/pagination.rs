// Page state and page slicing, locally or as remote $skip/$limit stages

use serde::Serialize;

use crate::{mfind::LookupStage, query::CompiledQuery};

/// Never fewer than one page, so an empty result shows as "no results" on page 1.
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    let pages = total_count.div_ceil(size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub current: u32,
    pub page_size: u32,
    pub total_count: u64,
}

impl PageState {
    pub fn new(page_size: u32) -> Self {
        Self { current: 1, page_size: page_size.max(1), total_count: 0 }
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.total_count, self.page_size)
    }

    /// Moves to `page`, clamped to the known page range.
    pub fn go_to(&mut self, page: u32) {
        self.current = page.clamp(1, self.total_pages());
    }

    pub fn reset(&mut self) {
        self.current = 1;
    }

    /// Records a new total and pulls the current page back into range.
    pub fn set_total(&mut self, total_count: u64) {
        self.total_count = total_count;
        self.current = self.current.clamp(1, self.total_pages());
    }

    pub fn show_controls(&self) -> bool {
        self.total_pages() > 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: u32,
}

/// Slices an already-fetched result set. `current_page` is clamped into range.
pub fn paginate<T: Clone>(items: &[T], page_size: u32, current_page: u32) -> Page<T> {
    let total = total_pages(items.len() as u64, page_size);
    let page = current_page.clamp(1, total) as usize;
    let size = page_size.max(1) as usize;
    let start = (page - 1) * size;
    let page_items = items.iter().skip(start).take(size).cloned().collect();
    Page { items: page_items, total_pages: total }
}

/// Pipeline that filters then pages on the server.
pub fn build_page_query(query: &CompiledQuery, page_size: u32, current_page: u32) -> Vec<LookupStage> {
    let size = u64::from(page_size.max(1));
    vec![
        LookupStage::Match(query.clone()),
        LookupStage::Skip(u64::from(current_page.max(1) - 1) * size),
        LookupStage::Limit(size),
    ]
}
