use clap::{CommandFactory, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use timmy_chat::cli::Args;
use timmy_chat::config::ClientConfig;
use timmy_chat::history::{load_history, HistoryClient};
use timmy_chat::reconnect::{RetryPolicy, TokioSleeper};
use timmy_chat::render::TerminalRenderer;
use timmy_chat::transport::WsConnector;
use timmy_chat::{Input, SessionController, SessionOutcome};

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Forward stdin lines to the session until EOF or `/quit`.
async fn read_stdin(tx: mpsc::Sender<Input>) {
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    while let Some(line) = lines.next().await {
        let input = match line {
            Ok(l) => Input::parse(&l),
            Err(e) => {
                debug!(error = %e, "stdin read failed");
                break;
            }
        };
        let quit = input == Input::Quit;
        if tx.send(input).await.is_err() || quit {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "timmy-chat", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(&args);

    let config = ClientConfig::resolve(&args)?;
    let endpoints = config.endpoints()?;

    let renderer = TerminalRenderer::stdout(config.tool_preview_lines);
    let mut session = SessionController::new(
        endpoints.clone(),
        WsConnector,
        renderer,
        TokioSleeper,
        RetryPolicy::new(config.reconnect.clone()),
    )
    .with_greeting(config.greeting());

    if config.load_history {
        let client = HistoryClient::new(endpoints.history.clone(), config.history_timeout());
        let entries = load_history(&client).await;
        session.replay_history(&entries);
    }

    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(read_stdin(tx));

    let outcome = session.run(&mut rx).await;
    debug!(%outcome, "session finished");

    // A blocking stdin read would keep the runtime alive on shutdown.
    std::process::exit(match outcome {
        SessionOutcome::Disposed => 0,
        SessionOutcome::GaveUp { .. } => 1,
    });
}
