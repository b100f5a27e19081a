//! Pagination state machine: Idle -> Loading -> Idle per page, with a
//! one-way latch once the catalog is exhausted.
//!
//! Purely synchronous; the feed drives it from the single apply context and
//! runs the actual page fetch on a worker task.

use crate::api::{Item, PageRequest};

pub struct Pager {
    items: Vec<Item>,
    loading: bool,
    all_loaded: bool,
    page_size: usize,
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            all_loaded: false,
            page_size,
        }
    }

    /// Start the next page load if one can start.
    ///
    /// Returns `None` while a load is outstanding or once everything is
    /// loaded; otherwise flips to Loading and yields the request for the
    /// page starting right after the items already held.
    pub fn begin_load(&mut self) -> Option<PageRequest> {
        if self.loading || self.all_loaded {
            return None;
        }

        self.loading = true;
        Some(PageRequest {
            offset: self.items.len(),
            limit: self.page_size,
        })
    }

    /// Apply a successful page, preserving server order.
    ///
    /// Returns the inserted range as `(offset, count)`. A page shorter than
    /// the page size latches `all_loaded`; the catalog sends no explicit
    /// end-of-data marker, so a short page is the only exhaustion signal.
    pub fn complete(&mut self, page: Vec<Item>) -> (usize, usize) {
        let offset = self.items.len();
        let count = page.len();

        self.items.extend(page);
        if count < self.page_size {
            self.all_loaded = true;
        }
        self.loading = false;

        (offset, count)
    }

    /// Apply a failed page load: back to Idle, collection and latch untouched.
    pub fn fail(&mut self) {
        self.loading = false;
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn loaded_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn all_loaded(&self) -> bool {
        self.all_loaded
    }
}
