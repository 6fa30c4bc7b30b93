//! `olympus ask`: submit one query and print the answer as it streams.
//!
//! Tokens are written to stdout as they arrive. When a `replace` event
//! rewrites text that was already printed, a `[revised]` marker is printed
//! followed by the full corrected answer. Citations and the confidence score
//! follow once the stream completes.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use olympus_core::models::{Citation, QueryRequest};
use olympus_core::transcript::{TranscriptEntry, TranscriptStatus};

use crate::auth_api::AuthClient;
use crate::config::Config;
use crate::state::{PreferencesStore, StaticToken, TokenSource};
use crate::stream::{QueryHandle, StreamingQueryClient};
use crate::transport::HttpTransport;

/// Arguments of `olympus ask`.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub query: String,
    pub space_id: Option<String>,
    pub user_id: Option<String>,
    /// `None` defers to the saved preference.
    pub save: Option<bool>,
    pub timeout: Option<Duration>,
    pub json: bool,
}

/// Build the request, falling back to saved preferences.
pub fn build_request(options: &AskOptions, prefs: &PreferencesStore) -> QueryRequest {
    let saved = prefs.get();
    let mut request = QueryRequest::new(options.query.clone())
        .with_persist(options.save.unwrap_or(saved.persist_queries));
    if let Some(space_id) = options.space_id.clone().or(saved.active_space_id) {
        request = request.with_space(space_id);
    }
    if let Some(user_id) = &options.user_id {
        request = request.with_user(user_id.clone());
    }
    request
}

/// CLI entry point for `olympus ask`.
pub async fn run_ask(
    config: &Config,
    tokens: Arc<dyn TokenSource>,
    prefs: &PreferencesStore,
    options: AskOptions,
) -> Result<()> {
    let request = build_request(&options, prefs);
    let tokens = if config.api.use_sse_token {
        exchange_for_sse_token(config, tokens).await?
    } else {
        tokens
    };

    let transport = HttpTransport::new(&config.api).context("Failed to build HTTP client")?;
    let client = StreamingQueryClient::new(&config.api, Arc::new(transport), tokens);
    let handle = client.submit(request)?;

    let follow = follow(&handle, !options.json);
    match options.timeout {
        Some(limit) => match tokio::time::timeout(limit, follow).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    handle_id = %handle.id(),
                    timeout_secs = limit.as_secs(),
                    "query timed out"
                );
                handle.cancel();
            }
        },
        None => follow.await?,
    }

    let entry = handle.wait().await;
    if options.json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_summary(&entry);
    }

    if entry.status == TranscriptStatus::Error {
        bail!(
            "query failed: {}",
            entry.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

/// Swap the access token for a short-lived stream token.
///
/// With no access token the original source is returned unchanged, so
/// `submit` reports the missing token.
async fn exchange_for_sse_token(
    config: &Config,
    tokens: Arc<dyn TokenSource>,
) -> Result<Arc<dyn TokenSource>> {
    let Some(access_token) = tokens.access_token() else {
        return Ok(tokens);
    };
    let sse = AuthClient::new(&config.api)?
        .sse_token(&access_token)
        .await
        .context("Failed to exchange access token for a stream token")?;
    tracing::debug!(expires_in = sse.expires_in, "using short-lived stream token");
    Ok(Arc::new(StaticToken::new(sse.sse_token)))
}

/// Wait for the stream to finish, printing answer text live when `live`.
async fn follow(handle: &QueryHandle, live: bool) -> Result<()> {
    if !live {
        handle.wait().await;
        return Ok(());
    }

    let mut updates = handle.subscribe();
    let mut printed = String::new();
    let mut stdout = std::io::stdout();
    loop {
        let finished = {
            let entry = updates.borrow_and_update();
            match delta(&printed, &entry.answer_text) {
                Delta::Unchanged => {}
                Delta::Append(suffix) => write!(stdout, "{}", suffix)?,
                Delta::Revised => write!(stdout, "\n[revised]\n{}", entry.answer_text)?,
            }
            printed.clone_from(&entry.answer_text);
            entry.is_terminal()
        };
        stdout.flush()?;
        if finished || updates.changed().await.is_err() {
            break;
        }
    }
    if !printed.is_empty() {
        writeln!(stdout)?;
    }
    Ok(())
}

/// How the visible answer changed since the last print.
#[derive(Debug, PartialEq, Eq)]
enum Delta<'a> {
    Unchanged,
    Append(&'a str),
    Revised,
}

fn delta<'a>(printed: &str, current: &'a str) -> Delta<'a> {
    if printed == current {
        Delta::Unchanged
    } else if let Some(suffix) = current.strip_prefix(printed) {
        Delta::Append(suffix)
    } else {
        Delta::Revised
    }
}

fn print_summary(entry: &TranscriptEntry) {
    if !entry.citations.is_empty() {
        println!();
        println!("{}", render_citations(&entry.citations));
    }
    if let Some(score) = entry.confidence_score {
        println!("Confidence: {:.0}%", score * 100.0);
    }
    if let Some(query_id) = &entry.query_id {
        println!("Saved as {}", query_id);
    }
}

/// Numbered source list for terminal output.
pub fn render_citations(citations: &[Citation]) -> String {
    let mut out = String::from("Sources:");
    for citation in citations {
        let title = citation
            .document_title
            .as_deref()
            .unwrap_or(&citation.document_id);
        out.push_str(&format!("\n  [{}] {}", citation.index, title));
        if let Some(page) = citation.page_number {
            out.push_str(&format!(", p. {}", page));
        }
        out.push_str(&format!(
            " ({} confidence, {:.2})",
            citation.effective_confidence().as_str(),
            citation.similarity_score
        ));
    }
    out
}
