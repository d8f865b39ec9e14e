//! Cursor pagination over an ordered ID listing.
//!
//! The cursor is the ID of the last item of the previous page. A cursor that
//! no longer resolves (its record was deleted) restarts from the first item
//! instead of failing; twins rely on that to mimic the APIs they clone.

use serde::{Deserialize, Serialize};

/// One page of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub has_more: bool,
    /// ID of the last item in `data`, empty when `data` is empty.
    pub cursor: String,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            has_more: self.has_more,
            cursor: self.cursor,
            total: self.total,
        }
    }
}

/// Window of `order` selected by `cursor` and `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
    pub has_more: bool,
}

/// Position the next page starts at.
pub fn start_position<S: AsRef<str>>(order: &[S], cursor: &str) -> usize {
    if cursor.is_empty() {
        return 0;
    }
    order
        .iter()
        .position(|id| id.as_ref() == cursor)
        .map(|index| index + 1)
        .unwrap_or(0)
}

pub fn window<S: AsRef<str>>(order: &[S], cursor: &str, limit: usize) -> Window {
    let start = start_position(order, cursor).min(order.len());
    let end = start.saturating_add(limit).min(order.len());
    Window {
        start,
        end,
        has_more: end < order.len(),
    }
}

/// Build a page from a point-in-time ordering. `resolve` maps an ID to its record.
pub fn paginate<S, T, F>(order: &[S], cursor: &str, limit: usize, total: usize, mut resolve: F) -> Page<T>
where
    S: AsRef<str>,
    F: FnMut(&str) -> Option<T>,
{
    let Window {
        start,
        end,
        has_more,
    } = window(order, cursor, limit);

    let slice = &order[start..end];
    let data: Vec<T> = slice.iter().filter_map(|id| resolve(id.as_ref())).collect();
    let cursor = slice
        .last()
        .map(|id| id.as_ref().to_string())
        .unwrap_or_default();

    Page {
        data,
        has_more,
        cursor,
        total,
    }
}
