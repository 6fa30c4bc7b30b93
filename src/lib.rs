//! # Olympus
//!
//! Streaming query client for the Olympus document Q&A backend.
//!
//! A query is submitted once; the backend answers over a single
//! Server-Sent Events connection with answer fragments, corrections,
//! citations, and a terminal `done` or `error` event. The client folds
//! those events into a live [`TranscriptEntry`](olympus_core::transcript::TranscriptEntry).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌──────────────────┐
//! │ SessionStore │──▶│ StreamingQuery     │──▶│ QueryHandle      │
//! │ (token)      │   │ Client (submit)    │   │ watch<Transcript>│
//! └──────────────┘   └─────────┬──────────┘   └────────┬─────────┘
//!                              │ SSE                   │
//!                              ▼                       ▼
//!                    ┌───────────────────┐      ┌────────────┐
//!                    │ /api/query/stream │      │ CLI (ask)  │
//!                    └───────────────────┘      └────────────┘
//! ```
//!
//! Pure decoding and folding live in the `olympus-core` crate; this crate
//! adds I/O: configuration, persisted state, HTTP, and the CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! olympus auth login --email me@example.com
//! olympus space use 6f1c...            # optional default space
//! olympus ask "What does the handbook say about leave?"
//! olympus history list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`state`] | Persisted session and preferences |
//! | [`transport`] | Byte-stream transport seam and its HTTP implementation |
//! | [`stream`] | `StreamingQueryClient` and `QueryHandle` |
//! | [`http`] | Shared request/response plumbing |
//! | [`auth_api`] | Auth service client, `olympus auth` |
//! | [`history`] | Query history client, `olympus history` |
//! | [`space`] | Default space, `olympus space` |
//! | [`ask`] | `olympus ask` |

pub mod ask;
pub mod auth_api;
pub mod config;
pub mod history;
pub mod http;
pub mod logging;
pub mod space;
pub mod state;
pub mod stream;
pub mod transport;
