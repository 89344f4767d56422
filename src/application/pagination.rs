//! Page-number pagination shared by every post listing.
//!
//! Requests carry a free-form `page` token. A missing or non-numeric token
//! resolves to the first page; numbers outside `1..=num_pages` resolve to the
//! last page. Resolution never fails, so listings always render something.

use std::num::NonZeroU32;

/// Splits an ordered listing into fixed-size pages.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: NonZeroU32,
}

/// The slice of a listing selected for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: u64,
}

impl PageWindow {
    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }

    /// Number of items this page holds once fetched.
    pub fn len(&self) -> u64 {
        self.count
            .saturating_sub(self.offset())
            .min(self.per_page)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
        }
    }
}

impl Paginator {
    pub fn new(per_page: NonZeroU32) -> Self {
        Self { per_page }
    }

    pub fn per_page(&self) -> u64 {
        u64::from(self.per_page.get())
    }

    /// `ceil(count / per_page)`, with an empty listing still having one page.
    pub fn num_pages(&self, count: u64) -> u64 {
        count.div_ceil(self.per_page()).max(1)
    }

    pub fn window(&self, requested: Option<&str>, count: u64) -> PageWindow {
        let num_pages = self.num_pages(count);
        let number = match requested.map(str::trim).map(str::parse::<i64>) {
            None | Some(Err(_)) => 1,
            Some(Ok(value)) if value >= 1 && (value as u64) <= num_pages => value as u64,
            Some(Ok(_)) => num_pages,
        };

        PageWindow {
            number,
            num_pages,
            count,
            per_page: self.per_page(),
        }
    }
}

/// One page of results plus the metadata templates need to link around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_page_number(&self) -> Option<u64> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<u64> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
        }
    }
}
