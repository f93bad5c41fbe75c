mod config;
mod docker;
mod runtime;
mod state;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Cli, Config};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use docker::DockerGateway;
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use runtime::{ActionExecutor, PollOptions};
use state::{App, Command, SessionEvent};
use std::{fs::OpenOptions, io, sync::Arc, sync::Mutex};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use whale_core::ResourceGateway;

const EVENT_QUEUE_CAPACITY: usize = 16;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_cli(Cli::parse())?;
    init_logging(&config)?;

    let gateway = DockerGateway::connect(config.docker_host.as_deref())
        .context("failed to set up container runtime client")?;
    gateway
        .ping()
        .await
        .context("container runtime is not reachable")?;
    let gateway = Arc::new(gateway);
    info!(event = "connected", tick_ms = config.tick_rate.as_millis() as u64);

    let options = PollOptions {
        interval: config.tick_rate,
        timeout: config.poll_timeout,
        include_intermediate_images: config.include_intermediate_images,
    };
    let mut app = App::new();
    app.handle(SessionEvent::Tick(
        runtime::poll_inventory(gateway.as_ref(), &options).await,
    ));

    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let poller = runtime::spawn_poller(Arc::clone(&gateway), options, tx);
    let executor = ActionExecutor::new(gateway);

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, rx, &executor).await;
    restore_terminal(&mut terminal)?;
    poller.abort();
    result
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // The terminal belongs to the UI; logs only go somewhere when asked for.
    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app<G: ResourceGateway>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut ticks: mpsc::Receiver<SessionEvent>,
    executor: &ActionExecutor<G>,
) -> Result<()> {
    let mut events = EventStream::new();
    let size = terminal.size()?;
    app.handle(SessionEvent::Resize(size.width, size.height));

    loop {
        terminal.draw(|f| ui::render(f, app))?;

        let event = tokio::select! {
            Some(tick) = ticks.recv() => tick,
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind != KeyEventKind::Release => {
                    SessionEvent::Key(key)
                }
                Some(Ok(Event::Resize(width, height))) => SessionEvent::Resize(width, height),
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(err).context("failed to read terminal input"),
                None => return Ok(()),
            },
        };

        for command in app.handle(event) {
            match command {
                Command::Apply(request) => {
                    // Completion is observed through later polls, not through the handle.
                    drop(executor.submit(request));
                }
                Command::Quit => {
                    info!(event = "quit", pending = app.ledger.len());
                    return Ok(());
                }
            }
        }
    }
}
