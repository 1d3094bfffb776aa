//! Utility functions and helpers.

pub mod http;
pub mod log;

use url::Url;

use crate::error::Result;
use crate::models::PageRequest;

/// Build the JSON listing URL for one page request.
///
/// `after` is only sent when a cursor is present.
pub fn listing_url(base_url: &str, request: &PageRequest) -> Result<Url> {
    let base = Url::parse(base_url)?;
    let path = format!(
        "r/{}/{}.json",
        request.source_id.as_str(),
        request.sort_mode.as_str()
    );
    let mut url = base.join(&path)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("limit", &request.effective_page_size().to_string());
        query.append_pair("t", request.timeframe.as_str());
        if let Some(cursor) = &request.cursor {
            query.append_pair("after", cursor);
        }
    }
    Ok(url)
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}
