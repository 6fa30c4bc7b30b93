//! URL construction for the streaming query endpoint.

use url::Url;

use crate::models::QueryRequest;

/// Default path of the streaming endpoint on the backend.
pub const DEFAULT_STREAM_PATH: &str = "/api/query/stream";

/// Join `base_url` and an absolute `path`, keeping any path prefix on the
/// base (e.g. `https://host/backend` + `/api/x` → `https://host/backend/api/x`).
pub fn join_path(base_url: &str, path: &str) -> Result<Url, url::ParseError> {
    let base = base_url.trim_end_matches('/');
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    Url::parse(&format!("{}{}", base, path))
}

/// Build the stream URL for `request`.
///
/// Parameters: `query`, `space_id` and `user_id` when set, and
/// `save_to_db` (`"true"`/`"false"`) always. When `token` is given it is
/// appended as the `token` parameter, for transports that cannot send an
/// `Authorization` header.
pub fn stream_url(
    base_url: &str,
    path: &str,
    request: &QueryRequest,
    token: Option<&str>,
) -> Result<Url, url::ParseError> {
    let mut url = join_path(base_url, path)?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("query", &request.query_text);
        if let Some(space_id) = &request.space_id {
            pairs.append_pair("space_id", space_id);
        }
        if let Some(user_id) = &request.user_id {
            pairs.append_pair("user_id", user_id);
        }
        pairs.append_pair("save_to_db", if request.persist { "true" } else { "false" });
        if let Some(token) = token {
            pairs.append_pair("token", token);
        }
    }
    Ok(url)
}
