use std::sync::Arc;

use assess_proto::{Insights, ProgressBoard};
use run_store::{FileRunStore, MemoryRunStore, RunStore};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::cli::error::CliError;
use crate::cli::{render, Cli, Command, RunsArgs, StoreArgs, SubmitArgs};
use crate::config::Config;
use crate::jobs::{JobClient, Upload};
use crate::session::{SessionManager, SessionState};
use crate::telemetry::logging;
use crate::transport::WebSocketConnector;

pub async fn run(cli: Cli) -> Result<(), CliError> {
    logging::init(&cli.logging.to_config())?;

    let mut config = Config::from_env();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(ws_url) = cli.ws_url {
        config.stream_url = Some(ws_url);
    }
    if let Some(path) = cli.store.path.clone() {
        config.store_path = Some(path);
    }
    config.validate()?;

    let store = open_store(&config, &cli.store)?;
    match cli.command {
        Command::Submit(args) => submit(&config, store, args).await,
        Command::Watch(args) => follow(&config, store, &args.job_id).await,
        Command::Runs(args) => list_runs(store.as_ref(), &args),
        Command::Insights => {
            let insights = Insights::from_runs(&store.list_dedup());
            print!("{}", render::insights(&insights));
            Ok(())
        }
        Command::Clear => {
            store.clear();
            println!("Cleared stored runs.");
            Ok(())
        }
    }
}

fn open_store(config: &Config, args: &StoreArgs) -> Result<Arc<dyn RunStore>, CliError> {
    if args.ephemeral {
        debug!(target: "assess::store", "using in-memory run store");
        return Ok(MemoryRunStore::new());
    }
    let path = match &config.store_path {
        Some(path) => path.clone(),
        None => FileRunStore::default_path()?,
    };
    debug!(target: "assess::store", path = %path.display(), "using file run store");
    Ok(FileRunStore::open(path))
}

async fn submit(
    config: &Config,
    store: Arc<dyn RunStore>,
    args: SubmitArgs,
) -> Result<(), CliError> {
    let student = Upload::from_path(&args.student).await?;
    let answer_key = Upload::from_path(&args.key).await?;
    let ticket = JobClient::new(&config.api_url)
        .start_assessment(student, answer_key)
        .await?;
    println!("Job {}", ticket.job_id);
    if args.detach {
        return Ok(());
    }
    follow(config, store, &ticket.job_id).await
}

/// Streams a job until it reaches a terminal event, the session gives up, or
/// the user interrupts, then prints the collapsed board.
async fn follow(config: &Config, store: Arc<dyn RunStore>, job_id: &str) -> Result<(), CliError> {
    let session = SessionManager::builder(config.session_options()?)
        .connector(Arc::new(WebSocketConnector::new(config.handshake_timeout())))
        .store(store)
        .spawn();
    let mut feed = session.subscribe();
    let mut states = session.watch_state();
    session.bind(Some(job_id)).await;
    info!(target: "assess::session", job_id, "following job");

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let outcome = loop {
        tokio::select! {
            biased;

            event = feed.recv() => match event {
                Ok(event) => {
                    println!("{}", render::event_line(&event));
                    if event.is_terminal() {
                        break Ok(());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "assess::session", skipped, "output fell behind the stream");
                }
                Err(RecvError::Closed) => break Err(CliError::Stream("session ended".into())),
            },
            changed = states.changed() => {
                if changed.is_err() {
                    break Err(CliError::Stream("session ended".into()));
                }
                let state = *states.borrow_and_update();
                debug!(target: "assess::session", %state, "stream state");
                let gave_up = match state {
                    SessionState::Exhausted => true,
                    SessionState::Closed(_) => !config.auto_reconnect,
                    _ => false,
                };
                if gave_up {
                    let message = session
                        .last_error()
                        .unwrap_or_else(|| "stream closed before the job finished".into());
                    break Err(CliError::Stream(message));
                }
            }
            _ = &mut interrupt => {
                eprintln!("Interrupted; progress so far is saved.");
                break Ok(());
            }
        }
    };

    let board = ProgressBoard::from_events(&session.events());
    session.shutdown().await;
    if !board.questions.is_empty() || board.summary.is_some() {
        print!("{}", render::board(&board));
    }
    outcome
}

fn list_runs(store: &dyn RunStore, args: &RunsArgs) -> Result<(), CliError> {
    let runs = if args.dedup {
        store.list_dedup()
    } else {
        store.list()
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
    } else {
        print!("{}", render::runs(&runs));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn unwritable_log_file_fails_before_any_command_runs() {
        let dir = tempfile::tempdir().unwrap();
        let log_file = dir.path().join("missing").join("assess.log");
        let cli = Cli::try_parse_from([
            "assess",
            "runs",
            "--ephemeral",
            "--log-file",
            log_file.to_str().unwrap(),
        ])
        .unwrap();

        let err = run(cli).await.unwrap_err();
        assert!(matches!(err, CliError::Logging(_)), "unexpected error {err}");
    }
}
