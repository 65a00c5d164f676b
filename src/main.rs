//! `planning-watch`: follow one planning-poker session from the terminal.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use planning_poker_client::{
    config::ClientConfig,
    dao::{
        http::ApiClient,
        planning::{HttpPlanningStore, PlanningStore},
    },
    dto::{format_timestamp, planning::SessionSnapshot},
    services::{
        auth_service::AuthService, dispatcher::ActionDispatcher, snapshot::SnapshotFetcher,
        subscription::SessionSubscription,
    },
    state::{ConnectionStatus, SessionView, auth::AuthContext},
};

#[derive(Debug, Parser)]
#[command(name = "planning-watch", about = "Follow a planning-poker session live")]
struct Args {
    /// Session to follow.
    session_id: String,
    /// REST base URL; overrides the configuration file and environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Credentials file; overrides the configuration file and environment.
    #[arg(long, value_name = "PATH")]
    credentials: Option<PathBuf>,
    /// Log in before subscribing.
    #[arg(long, requires = "password")]
    username: Option<String>,
    /// Password for `--username`, or for the remembered username when that flag is absent.
    #[arg(long)]
    password: Option<String>,
    /// Keep the username in the credentials file.
    #[arg(long)]
    remember: bool,
    /// Vote to submit once subscribed.
    #[arg(long, value_name = "VALUE")]
    vote: Option<String>,
    /// Reveal the votes once subscribed.
    #[arg(long)]
    reveal: bool,
    /// Final estimate to record once subscribed.
    #[arg(long, value_name = "VALUE")]
    estimate: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = ClientConfig::load();
    if let Some(url) = &args.api_url {
        config = config.with_api_base_url(url.clone());
    }
    if let Some(path) = &args.credentials {
        config = config.with_credentials_path(path.clone());
    }

    let auth = match config.credentials_path() {
        Some(path) => AuthContext::load(path),
        None => AuthContext::in_memory(),
    }
    .with_unauthorized_hook(|| warn!("credentials expired; log in again with --username"));
    let auth = Arc::new(auth);

    let api = ApiClient::new(config.api_base_url(), Arc::clone(&auth))
        .context("building API client")?;
    if let Some(password) = &args.password {
        let accounts = AuthService::new(api.clone());
        let username = accounts
            .login_username(args.username.as_deref())
            .context("no username given and none remembered; pass --username")?;
        accounts
            .login(&username, password, args.remember)
            .await
            .context("logging in")?;
    }

    let store: Arc<dyn PlanningStore> = Arc::new(HttpPlanningStore::new(api));
    let snapshot = SnapshotFetcher::new(Arc::clone(&store))
        .fetch(&args.session_id)
        .await
        .context("fetching session")?;
    let can_reveal = snapshot.can_reveal(auth.claims().as_ref());
    log_snapshot(&snapshot, can_reveal);

    let mut subscription = SessionSubscription::start(&config, &auth, &snapshot.id)
        .context("subscribing to session")?;
    info!(subscription = %subscription.id(), "following session; press Ctrl+C to stop");

    let dispatcher = ActionDispatcher::new(store);
    dispatch(&dispatcher, &args, &snapshot, can_reveal).await;

    let mut updates = WatchStream::new(subscription.watch());
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    let mut was_connected = false;

    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(view) = update else { break };
                log_view(&view);
                match view.connection() {
                    ConnectionStatus::Connected => was_connected = true,
                    ConnectionStatus::Disconnected => {
                        if was_connected {
                            info!("realtime channel closed");
                        } else {
                            warn!("realtime channel could not be opened");
                        }
                        break;
                    }
                    ConnectionStatus::Connecting => {}
                }
            }
            _ = &mut interrupted => {
                info!("interrupted");
                break;
            }
        }
    }

    subscription.close();
    Ok(())
}

/// Send the actions requested on the command line. Failures are reported, not fatal.
async fn dispatch(
    dispatcher: &ActionDispatcher,
    args: &Args,
    snapshot: &SessionSnapshot,
    can_reveal: bool,
) {
    if let Some(value) = &args.vote {
        if !snapshot.is_voting() {
            warn!(status = ?snapshot.status, "session is not accepting votes; skipping vote");
        } else if !snapshot.scale.accepts(value) {
            warn!(
                value = %value,
                scale = %snapshot.scale,
                "value is not on the session scale; skipping vote"
            );
        } else if let Err(err) = dispatcher.submit_vote(&snapshot.id, value).await {
            warn!(error = %err.user_message(), "vote not recorded");
        }
    }

    if args.reveal {
        if !can_reveal {
            warn!("only the session creator or a facilitator can reveal; skipping");
        } else if let Err(err) = dispatcher.reveal(&snapshot.id).await {
            warn!(error = %err.user_message(), "reveal failed");
        }
    }

    if let Some(estimate) = &args.estimate {
        if !can_reveal {
            warn!("only the session creator or a facilitator can set the estimate; skipping");
        } else if let Err(err) = dispatcher.set_final_estimate(&snapshot.id, estimate).await {
            warn!(error = %err.user_message(), "final estimate not recorded");
        }
    }
}

fn log_snapshot(snapshot: &SessionSnapshot, can_reveal: bool) {
    let values = snapshot.scale.values().join(" ");
    let created_at = snapshot
        .created_at
        .map(format_timestamp)
        .unwrap_or_else(|| "-".into());
    info!(
        session_id = %snapshot.id,
        story_id = snapshot.story_id.as_deref().unwrap_or("-"),
        status = ?snapshot.status,
        scale = %snapshot.scale,
        values = %values,
        vote_count = snapshot.vote_count,
        created_at = %created_at,
        can_reveal,
        "session snapshot"
    );
}

fn log_view(view: &SessionView) {
    let participants = view
        .roster()
        .iter()
        .map(|(id, participant)| participant.username.as_deref().unwrap_or(id.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    match view.revealed() {
        Some(result) => {
            let votes = result
                .votes
                .iter()
                .map(|vote| format!("{}={}", vote.display_name(), vote.value))
                .collect::<Vec<_>>()
                .join(", ");
            info!(
                phase = ?view.phase(),
                connection = ?view.connection(),
                participants = %participants,
                votes = %votes,
                average = ?result.average,
                median = ?result.median,
                "votes revealed"
            );
        }
        None => info!(
            phase = ?view.phase(),
            connection = ?view.connection(),
            participants = %participants,
            vote_count = view.vote_count(),
            "session update"
        ),
    }
}

/// Configure tracing subscribers; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
