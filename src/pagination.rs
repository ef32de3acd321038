use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u32,
    pub offset: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl Pagination {
    pub fn next_offset(&self) -> Option<u32> {
        self.has_more.then(|| self.offset.saturating_add(self.limit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn first(limit: u32) -> Self {
        Self { offset: 0, limit }
    }

    pub fn next(&self, pagination: &Pagination) -> Option<Self> {
        pagination.next_offset().map(|offset| Self {
            offset,
            limit: self.limit,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Marks which in-flight list request is the current one.
///
/// A newer search or page request calls [`RequestGeneration::begin`]; when an
/// older request completes, [`RequestGeneration::finish`] drops its result.
#[derive(Clone, Default)]
pub struct RequestGeneration {
    current: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket(u64);

impl RequestGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> RequestTicket {
        RequestTicket(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.current.load(Ordering::SeqCst) == ticket.0
    }

    pub fn finish<T>(&self, ticket: RequestTicket, result: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(result)
        } else {
            trace!(ticket = ticket.0, "discarding superseded response");
            None
        }
    }
}

/// Accumulates pages of a list view.
#[derive(Debug, Clone)]
pub struct PagedList<T> {
    items: Vec<T>,
    pagination: Option<Pagination>,
}

impl<T> Default for PagedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pagination: None,
        }
    }
}

impl<T> PagedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a page; a page starting at offset 0 replaces everything.
    pub fn apply(&mut self, page: Paginated<T>) {
        if page.pagination.offset == 0 {
            self.items.clear();
        }
        self.items.extend(page.items);
        self.pagination = Some(page.pagination);
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn has_more(&self) -> bool {
        self.pagination.map(|p| p.has_more).unwrap_or(true)
    }

    pub fn next_request(&self, limit: u32) -> Option<PageRequest> {
        match self.pagination {
            None => Some(PageRequest::first(limit)),
            Some(pagination) => PageRequest { offset: 0, limit }.next(&pagination),
        }
    }
}
