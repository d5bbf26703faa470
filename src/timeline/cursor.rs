//! Timestamp cursors and page slicing.
//!
//! A listing is fixed by two things: the cursor (an upper bound on
//! `created_at`, defaulting to the request's "now") and a 1-based page
//! number. Rows written after the cursor never appear, so re-fetching page
//! N with the same cursor always yields the same slice.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const POST_PAGE_SIZE: usize = 20;
pub const MEDIA_PAGE_SIZE: usize = 30;

/// Raw `page` / `timestamp` query parameters shared by every listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub timestamp: Option<String>,
}

/// Validated paging input for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub cursor: DateTime<Utc>,
}

impl ListParams {
    pub fn resolve(&self, now: DateTime<Utc>) -> AppResult<PageRequest> {
        Ok(PageRequest {
            page: parse_page(self.page.as_deref())?,
            cursor: parse_cursor(self.timestamp.as_deref(), now)?,
        })
    }
}

pub fn parse_page(raw: Option<&str>) -> AppResult<usize> {
    let Some(raw) = raw else {
        return Ok(1);
    };
    match raw.trim().parse::<usize>() {
        Ok(page) if page >= 1 => Ok(page),
        _ => Err(AppError::BadRequest(format!(
            "page must be a positive integer, got {raw:?}"
        ))),
    }
}

/// Parse a UTC POSIX timestamp in seconds (fractions allowed). A missing
/// value resolves to `now`. Only years 0000 through 9999 are accepted, since
/// stored timestamps compare as fixed-width text.
pub fn parse_cursor(raw: Option<&str>, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    let Some(raw) = raw else {
        return Ok(now);
    };
    let invalid = || AppError::BadRequest(format!("Invalid timestamp {raw:?}"));

    let seconds: f64 = raw.trim().parse().map_err(|_| invalid())?;
    if !seconds.is_finite() {
        return Err(invalid());
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    let cursor = DateTime::from_timestamp(whole as i64, nanos).ok_or_else(invalid)?;
    if !(0..=9999).contains(&cursor.year()) {
        return Err(invalid());
    }
    Ok(cursor)
}

/// The listing envelope returned by every paginated endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    pub total_pages: usize,
    pub next: Option<usize>,
    pub previous: Option<usize>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// An empty first page.
    pub fn empty() -> Self {
        Self {
            count: 0,
            total_pages: 0,
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            total_pages: self.total_pages,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            count: self.count,
            total_pages: self.total_pages,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}

/// Page arithmetic for a listing of `count` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page: usize,
    pub size: usize,
    pub count: usize,
}

impl Pager {
    /// Fails with `InvalidPage` when `page` lies past the last page. Page 1
    /// of an empty listing is allowed.
    pub fn new(count: usize, page: usize, size: usize) -> AppResult<Self> {
        debug_assert!(size > 0);
        if page == 0 {
            return Err(AppError::InvalidPage);
        }
        let pager = Self { page, size, count };
        if page > pager.total_pages().max(1) {
            return Err(AppError::InvalidPage);
        }
        Ok(pager)
    }

    pub fn total_pages(&self) -> usize {
        self.count.div_ceil(self.size)
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.size
    }

    pub fn limit(&self) -> usize {
        self.size
    }

    pub fn next(&self) -> Option<usize> {
        (self.page < self.total_pages()).then_some(self.page + 1)
    }

    pub fn previous(&self) -> Option<usize> {
        (self.page > 1).then_some(self.page - 1)
    }

    /// Wrap the rows fetched for this window.
    pub fn finish<T>(&self, results: Vec<T>) -> Page<T> {
        Page {
            count: self.count,
            total_pages: self.total_pages(),
            next: self.next(),
            previous: self.previous(),
            results,
        }
    }

    /// Slice an already ordered in-memory candidate list.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let results = items
            .into_iter()
            .skip(self.offset())
            .take(self.limit())
            .collect();
        self.finish(results)
    }
}

/// Paginate an ordered in-memory sequence.
pub fn paginate<T>(items: Vec<T>, page: usize, size: usize) -> AppResult<Page<T>> {
    let pager = Pager::new(items.len(), page, size)?;
    Ok(pager.slice(items))
}
