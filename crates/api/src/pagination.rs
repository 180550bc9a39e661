//! Page-number pagination shared by every list endpoint.
//!
//! Requests use `?page=` (1-based) and `?page_size=`; responses are wrapped
//! in a `{count, next, previous, results}` envelope whose links are absolute
//! URLs built from the configured base URL.

use axum::http::Uri;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query parameters accepted by list endpoints.
///
/// Page values are kept as strings so malformed numbers produce the API's
/// own error body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub search: Option<String>,
}

impl ListQuery {
    /// The search term, trimmed, if non-empty.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Validate `page` and `page_size` from the query.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a non-numeric or zero page, or a
    /// non-numeric page size.
    pub fn from_query(query: &ListQuery, default_size: u32) -> Result<Self, AppError> {
        let page = match query.page.as_deref() {
            None | Some("") => 1,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| AppError::BadRequest("Invalid page.".to_string()))?,
        };

        let page_size = match query.page_size.as_deref() {
            None | Some("") => default_size,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| AppError::BadRequest("Invalid page size.".to_string()))?
                .min(MAX_PAGE_SIZE),
        };

        Ok(Self { page, page_size })
    }

    /// SQL `LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    /// Number of pages for `count` results. An empty result still has one page.
    #[must_use]
    pub fn page_count(&self, count: i64) -> i64 {
        let size = i64::from(self.page_size);
        ((count + size - 1) / size).max(1)
    }
}

/// Paginated response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wrap one page of results.
    ///
    /// `uri` is the original request URI; its path and other query
    /// parameters are kept in the links.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` ("Invalid page.") when the page is past
    /// the last one.
    pub fn new(
        request: PageRequest,
        count: i64,
        results: Vec<T>,
        base_url: &str,
        uri: &Uri,
    ) -> Result<Self, AppError> {
        let pages = request.page_count(count);
        let page = i64::from(request.page);
        if page > pages {
            return Err(AppError::NotFound("Invalid page.".to_string()));
        }

        let next = (page < pages).then(|| page_link(base_url, uri, request.page + 1));
        let previous = (page > 1).then(|| page_link(base_url, uri, request.page - 1));

        Ok(Self {
            count,
            next,
            previous,
            results,
        })
    }

    /// Convert the results, keeping the envelope.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Build the absolute link to `page` of the current listing.
///
/// Page 1 is linked without a `page` parameter.
fn page_link(base_url: &str, uri: &Uri, page: u32) -> String {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), uri.path());
    let Ok(mut url) = Url::parse(&raw) else {
        return raw;
    };

    let kept: Vec<(String, String)> = Url::parse(&format!("http://x/?{}", uri.query().unwrap_or("")))
        .map(|u| {
            u.query_pairs()
                .filter(|(k, _)| k != "page")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        if page > 1 {
            pairs.append_pair("page", &page.to_string());
        }
    }

    if url.query() == Some("") {
        url.set_query(None);
    }
    url.into()
}
