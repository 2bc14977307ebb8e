//! Maps relative API paths onto the configured service base URLs.

use atelier_config::{ServiceEndpoints, ServiceRoute};
use url::Url;

use crate::errors::ApiResult;

/// Build the absolute URL for `path`, choosing the base by path prefix.
/// Absolute `http(s)://` paths are used as-is.
pub fn resolve_url(
    endpoints: &ServiceEndpoints,
    path: &str,
    query: &[(String, String)],
) -> ApiResult<Url> {
    let mut url = if path.starts_with("http://") || path.starts_with("https://")
    {
        Url::parse(path)?
    } else {
        let base = endpoints.base_for(ServiceRoute::for_path(path));
        Url::parse(&format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        ))?
    };

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}
