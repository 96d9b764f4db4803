//! Next-page decision.
//!
//! A page's `Next-Page` header is followed only when all of these hold:
//! the page produced at least one new event, the header is non-empty, it
//! points at the same host as the current page, and the current page is
//! below [`MAX_PAGE_NUMBER`]. The decision is pure; enqueueing the
//! returned [`NextPage`] is the dispatcher's job.

use url::Url;

/// Highest page number ever fetched in one pagination chain.
pub const MAX_PAGE_NUMBER: u32 = 10;

/// Response header carrying the absolute URL of the following page.
pub const NEXT_PAGE_HEADER: &str = "Next-Page";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    pub url: String,
    pub page_number: u32,
}

pub fn next_page(
    new_events: usize,
    next_page: Option<&str>,
    current_url: &str,
    page_number: u32,
) -> Option<NextPage> {
    if new_events == 0 || page_number >= MAX_PAGE_NUMBER {
        return None;
    }

    let candidate = next_page.map(str::trim).filter(|s| !s.is_empty())?;
    if !same_host(candidate, current_url) {
        return None;
    }

    Some(NextPage {
        url: candidate.to_string(),
        page_number: page_number + 1,
    })
}

/// Host-only comparison of two absolute URLs. Scheme, port and path are
/// ignored; relative or host-less URLs never match.
pub fn same_host(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (Url::parse(a), Url::parse(b)) else {
        return false;
    };
    match (a.host_str(), b.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}
