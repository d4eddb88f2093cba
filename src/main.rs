use anyhow::{Context, Result};
use ratatui::{backend::Backend, Terminal};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod auth;
mod gemini;
mod handler;
mod secrets;
mod session;
mod tui;
mod ui;

use app::App;
use auth::ServiceCredential;
use gemini::GeminiClient;
use secrets::Secrets;

// Crate-local tracing targets are `askgemini::*` (the bin crate name).
const DEFAULT_LOG_DIRECTIVE: &str = "askgemini=info";

// Logs go to a file because the terminal itself hosts the UI.
fn init_logging() -> Result<()> {
    let log_dir = dirs::config_dir()
        .context("could not determine config directory")?
        .join("ask-gemini");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("could not create {}", log_dir.display()))?;
    let log_file = std::fs::File::create(log_dir.join("askgemini.log"))
        .context("could not open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ASKGEMINI_LOG")
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE)),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}

async fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: &mut tui::EventHandler,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event)?;
        }
        app.poll_generation().await;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    // Credential resolution failures are fatal and happen before the
    // terminal is touched, so the message lands on a usable screen.
    let secrets = Secrets::load()?;
    let credential = ServiceCredential::from_json(&secrets.service_key)
        .context("could not resolve the service credential")?;
    info!(project = %credential.project_id, "credential resolved");

    let client = GeminiClient::new(credential, secrets.datastore);
    let mut app = App::new(client);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    // The terminal is restored even when the loop exits with an error.
    let result = run(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;
    info!("session ended");

    result
}
