//! Page windowing for the project table.
//!
//! Pages are 1-indexed. With more than [`FULL_CONTROLS_LIMIT`] pages the control
//! bar keeps the first two and last two pages, the pages around the current
//! one, and ellipses in between.

use std::ops::Range;

/// Default number of rows per page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Up to this many pages every page number is shown
pub const FULL_CONTROLS_LIMIT: usize = 5;

/// Placeholder label for skipped page numbers
pub const BREAK_LABEL: &str = "...";

/// One entry of the page control bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageControl {
    Page { number: usize, active: bool },
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    current_page: usize,
    page_size: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Paginator {
    /// A zero page size is treated as 1
    pub fn new(page_size: usize) -> Self {
        Self {
            current_page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self, count: usize) -> usize {
        count.div_ceil(self.page_size)
    }

    /// Index range of the rows on the current page, clamped to `count`
    pub fn visible_range(&self, count: usize) -> Range<usize> {
        let start = ((self.current_page - 1) * self.page_size).min(count);
        let end = (start + self.page_size).min(count);
        start..end
    }

    pub fn page_items<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.visible_range(items.len())]
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self, count: usize) -> bool {
        self.current_page < self.total_pages(count)
    }

    /// Returns whether the page changed
    pub fn previous(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.current_page -= 1;
        true
    }

    /// Returns whether the page changed
    pub fn next(&mut self, count: usize) -> bool {
        if !self.has_next(count) {
            return false;
        }
        self.current_page += 1;
        true
    }

    /// Jump to `page`, clamped to the valid range
    pub fn go_to(&mut self, page: usize, count: usize) {
        self.current_page = page.clamp(1, self.total_pages(count).max(1));
    }

    /// Pull the current page back inside the list after it shrank
    pub fn clamp_to(&mut self, count: usize) {
        self.go_to(self.current_page, count);
    }

    pub fn controls(&self, count: usize) -> Vec<PageControl> {
        page_controls(self.total_pages(count), self.current_page)
    }
}

/// Build the page control bar for `total_pages` with `current` selected
pub fn page_controls(total_pages: usize, current: usize) -> Vec<PageControl> {
    let page = |number: usize| PageControl::Page {
        number,
        active: number == current,
    };

    if total_pages <= FULL_CONTROLS_LIMIT {
        return (1..=total_pages).map(page).collect();
    }

    let window_start = current.saturating_sub(1).max(3);
    let window_end = (current + 1).min(total_pages - 2);

    let mut controls = vec![page(1), page(2), PageControl::Ellipsis];
    if window_start <= window_end {
        controls.extend((window_start..=window_end).map(page));
        controls.push(PageControl::Ellipsis);
    }
    controls.push(page(total_pages - 1));
    controls.push(page(total_pages));
    controls
}
