//! Persisted query history: `olympus history list|get|delete`.
//!
//! Only queries submitted with `--save` (`save_to_db=true`) show up here.

use anyhow::{bail, Result};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use olympus_core::models::QueryRecord;

use crate::config::ApiConfig;
use crate::http::{api_client, check_status, endpoint, ApiError};
use crate::state::TokenSource;

pub const DEFAULT_LIMIT: u32 = 20;

/// The list endpoint answers either with a page object or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Page {
        queries: Vec<QueryRecord>,
        #[serde(default)]
        total: Option<u64>,
    },
    Bare(Vec<QueryRecord>),
}

/// One page of history.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub queries: Vec<QueryRecord>,
    /// Total matching records, when the server reports it.
    pub total: Option<u64>,
}

impl ListResponse {
    fn into_page(self) -> HistoryPage {
        match self {
            ListResponse::Page { queries, total } => HistoryPage { queries, total },
            ListResponse::Bare(queries) => HistoryPage {
                queries,
                total: None,
            },
        }
    }
}

pub struct HistoryClient {
    client: Client,
    config: ApiConfig,
    token: String,
}

impl HistoryClient {
    /// Fails with [`ApiError::NotSignedIn`] when `tokens` has no token.
    pub fn new(config: &ApiConfig, tokens: &dyn TokenSource) -> Result<Self, ApiError> {
        let token = tokens.access_token().ok_or(ApiError::NotSignedIn)?;
        Ok(Self {
            client: api_client(config)?,
            config: config.clone(),
            token,
        })
    }

    pub async fn list(
        &self,
        space_id: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<HistoryPage, ApiError> {
        let mut url = endpoint(&self.config, "/api/queries")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(space_id) = space_id {
                pairs.append_pair("space_id", space_id);
            }
            pairs.append_pair("limit", &limit.to_string());
            pairs.append_pair("offset", &offset.to_string());
        }
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = check_status(response, "query history").await?;
        let body: ListResponse = response.json().await?;
        Ok(body.into_page())
    }

    /// `/api/queries/<id>` with the id as one percent-encoded path segment.
    fn record_url(&self, id: &str) -> Result<Url, ApiError> {
        if id.is_empty() || id == "." || id == ".." {
            return Err(ApiError::InvalidId(id.to_string()));
        }
        let mut url = endpoint(&self.config, "/api/queries")?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(id);
        Ok(url)
    }

    pub async fn get(&self, id: &str) -> Result<QueryRecord, ApiError> {
        let url = self.record_url(id)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = check_status(response, &format!("query {}", id)).await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let url = self.record_url(id)?;
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        check_status(response, &format!("query {}", id)).await?;
        Ok(())
    }
}

/// CLI entry point for `olympus history list`.
pub async fn run_list(
    config: &ApiConfig,
    tokens: &dyn TokenSource,
    space_id: Option<&str>,
    limit: u32,
    offset: u32,
) -> Result<()> {
    if limit == 0 {
        bail!("--limit must be at least 1");
    }
    let client = HistoryClient::new(config, tokens)?;
    let page = client.list(space_id, limit, offset).await?;

    if page.queries.is_empty() {
        println!("No saved queries.");
        return Ok(());
    }

    for record in &page.queries {
        let status = record.status.map(|s| s.as_str()).unwrap_or("-");
        let when = record
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}  {:<10} {}  {}", record.id, status, when, record.label(60));
    }
    if let Some(total) = page.total {
        println!("\n{}", page_range(offset, page.queries.len(), total));
    }
    Ok(())
}

/// `first-last of total`, 1-based.
fn page_range(offset: u32, shown: usize, total: u64) -> String {
    let first = u64::from(offset) + 1;
    let last = u64::from(offset).saturating_add(shown as u64);
    format!("{}-{} of {}", first, last, total)
}

/// CLI entry point for `olympus history get`.
pub async fn run_get(
    config: &ApiConfig,
    tokens: &dyn TokenSource,
    id: &str,
    json: bool,
) -> Result<()> {
    let client = HistoryClient::new(config, tokens)?;
    let record = client.get(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("--- Query ---");
    println!("id:           {}", record.id);
    if let Some(title) = &record.title {
        println!("title:        {}", title);
    }
    if let Some(space_id) = &record.space_id {
        println!("space_id:     {}", space_id);
    }
    if let Some(status) = record.status {
        println!("status:       {}", status.as_str());
    }
    if let Some(score) = record.confidence_score {
        println!("confidence:   {:.2}", score);
    }
    if let Some(model) = &record.model_used {
        println!("model:        {}", model);
    }
    if let Some(created_at) = record.created_at {
        println!("created_at:   {}", created_at.to_rfc3339());
    }
    println!();
    println!("Q: {}", record.query_text);
    if let Some(result) = &record.result {
        println!();
        println!("{}", result);
    }
    if let Some(message) = &record.error_message {
        println!();
        println!("error: {}", message);
    }
    if let Some(sources) = &record.sources {
        if !sources.citations.is_empty() {
            println!();
            println!("{}", crate::ask::render_citations(&sources.citations));
        }
    }
    Ok(())
}

/// CLI entry point for `olympus history delete`.
pub async fn run_delete(config: &ApiConfig, tokens: &dyn TokenSource, id: &str) -> Result<()> {
    let client = HistoryClient::new(config, tokens)?;
    client.delete(id).await?;
    println!("Deleted query {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StaticToken;

    #[test]
    fn test_list_response_page_shape() {
        let body = r#"{"queries":[{"id":"q1","query_text":"what?"}],"total":7}"#;
        let page = serde_json::from_str::<ListResponse>(body).unwrap().into_page();
        assert_eq!(page.queries.len(), 1);
        assert_eq!(page.total, Some(7));
    }

    #[test]
    fn test_list_response_bare_array() {
        let body = r#"[{"id":"q1","query_text":"a"},{"id":"q2","query_text":"b"}]"#;
        let page = serde_json::from_str::<ListResponse>(body).unwrap().into_page();
        assert_eq!(page.queries.len(), 2);
        assert_eq!(page.total, None);
    }

    fn client() -> HistoryClient {
        HistoryClient::new(&ApiConfig::default(), &StaticToken::new("t")).unwrap()
    }

    #[test]
    fn test_record_id_stays_one_path_segment() {
        let client = client();
        for (id, path) in [
            ("q1", "/api/queries/q1"),
            ("../auth/logout", "/api/queries/..%2Fauth%2Flogout"),
            ("a/b", "/api/queries/a%2Fb"),
            ("abc?limit=1", "/api/queries/abc%3Flimit=1"),
            ("x#frag", "/api/queries/x%23frag"),
            ("50%", "/api/queries/50%25"),
        ] {
            let url = client.record_url(id).unwrap();
            assert_eq!(url.path(), path, "id {:?}", id);
            assert_eq!(url.query(), None);
            assert_eq!(url.fragment(), None);
        }
    }

    #[test]
    fn test_record_id_rejects_dot_segments() {
        let client = client();
        for id in ["", ".", ".."] {
            assert!(matches!(client.record_url(id), Err(ApiError::InvalidId(_))));
        }
    }

    #[test]
    fn test_record_url_keeps_base_path() {
        let config = ApiConfig {
            base_url: "https://example.com/olympus/".into(),
            ..ApiConfig::default()
        };
        let client = HistoryClient::new(&config, &StaticToken::new("t")).unwrap();
        let url = client.record_url("a/b").unwrap();
        assert_eq!(url.as_str(), "https://example.com/olympus/api/queries/a%2Fb");
    }

    #[test]
    fn test_page_range() {
        assert_eq!(page_range(0, 20, 57), "1-20 of 57");
        assert_eq!(page_range(40, 17, 57), "41-57 of 57");
        assert_eq!(
            page_range(u32::MAX, 1, 1),
            format!("{}-{} of 1", u64::from(u32::MAX) + 1, u64::from(u32::MAX) + 1)
        );
    }

    #[test]
    fn test_client_requires_token() {
        let err = HistoryClient::new(&ApiConfig::default(), &StaticToken::none())
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::NotSignedIn));
    }
}
