//! # Olympus CLI (`olympus`)
//!
//! Ask questions against an Olympus backend and watch the answer stream in.
//!
//! ## Usage
//!
//! ```bash
//! olympus --config ./config/olympus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `olympus ask "<q>"` | Stream an answer, then print citations and confidence |
//! | `olympus auth login` | Sign in and persist the session |
//! | `olympus auth logout` | Sign out and delete the persisted session |
//! | `olympus auth status` | Show the signed-in user and token expiry |
//! | `olympus auth set-token <t>` | Store a token obtained elsewhere |
//! | `olympus history list` | List saved queries |
//! | `olympus history get <id>` | Show one saved query |
//! | `olympus history delete <id>` | Delete a saved query |
//! | `olympus space use <id>` | Set the default space |
//! | `olympus space persist <bool>` | Save queries by default, or not |
//! | `olympus completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Sign in (password from OLYMPUS_PASSWORD when --password is omitted)
//! olympus auth login --email me@example.com
//!
//! # Ask within a space and save the result
//! olympus ask "Summarise the Q3 report" --space 6f1c... --save
//!
//! # Give up after 30 seconds, print the transcript as JSON
//! olympus ask "What changed in v2?" --timeout 30 --json
//! ```

use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use olympus::ask::{self, AskOptions};
use olympus::config;
use olympus::state::{PreferencesStore, SessionStore, StaticToken, TokenSource};
use olympus::{auth_api, history, logging, space};

/// Olympus CLI: streaming question answering over your document spaces.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "olympus",
    about = "Olympus: streaming question answering over your document spaces",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/olympus.toml`. When the file does not exist,
    /// defaults are used (`OLYMPUS_API_URL` still applies).
    #[arg(long, global = true, default_value = "./config/olympus.toml")]
    config: PathBuf,

    /// Log debug output from olympus to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ask a question and stream the answer.
    ///
    /// Answer text is printed as it arrives. Exits non-zero when the stream
    /// ends in an error, including a timeout.
    Ask {
        /// The question.
        query: String,

        /// Space to search. Defaults to the active space (`olympus space use`).
        #[arg(long)]
        space: Option<String>,

        /// User id to attribute the query to.
        #[arg(long)]
        user: Option<String>,

        /// Ask the backend to save this query to history.
        #[arg(long, conflicts_with = "no_save")]
        save: bool,

        /// Do not save this query, even if saving is the default.
        #[arg(long)]
        no_save: bool,

        /// Cancel the stream after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the final transcript as JSON instead of streaming text.
        #[arg(long)]
        json: bool,
    },

    /// Sign in, sign out, and inspect the stored session.
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Browse and delete saved queries.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Manage the default space and save preference.
    Space {
        #[command(subcommand)]
        action: SpaceAction,
    },

    /// Print a shell completion script to stdout.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Auth subcommands.
#[derive(Subcommand)]
enum AuthAction {
    /// Sign in with email and password.
    Login {
        #[arg(long)]
        email: String,

        /// Password. Read from `OLYMPUS_PASSWORD` when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Revoke the session and delete it locally.
    Logout,
    /// Show who is signed in and when the token expires.
    Status,
    /// Store an access token obtained elsewhere.
    SetToken {
        token: String,
    },
}

/// History subcommands.
#[derive(Subcommand)]
enum HistoryAction {
    /// List saved queries, newest first.
    List {
        /// Only queries in this space.
        #[arg(long)]
        space: Option<String>,

        #[arg(long, default_value_t = history::DEFAULT_LIMIT)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Show one saved query with its answer and sources.
    Get {
        id: String,

        /// Print the raw record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete a saved query.
    Delete {
        id: String,
    },
}

/// Space subcommands.
#[derive(Subcommand)]
enum SpaceAction {
    /// Make `<id>` the default space for `ask`.
    Use {
        id: String,
    },
    /// Forget the default space.
    Clear,
    /// Show the default space and save preference.
    Show,
    /// Save queries by default (`true`) or not (`false`).
    Persist {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "olympus", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_or_minimal(&cli.config)?;
    logging::init_logging(&cfg.logging, cli.verbose)?;
    tracing::debug!(
        config = %cli.config.display(),
        base_url = %cfg.api.base_url,
        "configuration loaded"
    );

    let session = Arc::new(SessionStore::hydrate(cfg.state.session_path()));
    let prefs = PreferencesStore::hydrate(cfg.state.preferences_path());

    match cli.command {
        Commands::Ask {
            query,
            space,
            user,
            save,
            no_save,
            timeout,
            json,
        } => {
            let save = match (save, no_save) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let options = AskOptions {
                query,
                space_id: space,
                user_id: user,
                save,
                timeout: timeout.map(Duration::from_secs),
                json,
            };
            ask::run_ask(&cfg, token_source(&session), &prefs, options).await?;
        }
        Commands::Auth { action } => match action {
            AuthAction::Login { email, password } => {
                auth_api::run_login(&cfg.api, &session, &email, password).await?;
            }
            AuthAction::Logout => {
                auth_api::run_logout(&cfg.api, &session).await?;
            }
            AuthAction::Status => {
                auth_api::run_status(&cfg.api, &session).await?;
            }
            AuthAction::SetToken { token } => {
                auth_api::run_set_token(&session, &token)?;
            }
        },
        Commands::History { action } => {
            let tokens = token_source(&session);
            match action {
                HistoryAction::List {
                    space,
                    limit,
                    offset,
                } => {
                    history::run_list(&cfg.api, tokens.as_ref(), space.as_deref(), limit, offset)
                        .await?;
                }
                HistoryAction::Get { id, json } => {
                    history::run_get(&cfg.api, tokens.as_ref(), &id, json).await?;
                }
                HistoryAction::Delete { id } => {
                    history::run_delete(&cfg.api, tokens.as_ref(), &id).await?;
                }
            }
        }
        Commands::Space { action } => match action {
            SpaceAction::Use { id } => space::run_use(&prefs, &id)?,
            SpaceAction::Clear => space::run_clear(&prefs)?,
            SpaceAction::Show => space::run_show(&prefs)?,
            SpaceAction::Persist { enabled } => space::run_persist(&prefs, enabled)?,
        },
        Commands::Completions { .. } => {
            // Handled above (before config loading)
        }
    }

    Ok(())
}

/// `OLYMPUS_TOKEN` wins over the stored session.
fn token_source(session: &Arc<SessionStore>) -> Arc<dyn TokenSource> {
    match std::env::var("OLYMPUS_TOKEN") {
        Ok(token) if !token.trim().is_empty() => {
            tracing::debug!("using token from OLYMPUS_TOKEN");
            Arc::new(StaticToken::new(token.trim()))
        }
        _ => session.clone(),
    }
}
