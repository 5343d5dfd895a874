mod api;
mod app;
mod config;
mod error;
mod forms;
mod logging;
mod models;
mod session;
mod store;
mod ui;

use crate::app::App;
use crate::config::Config;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use ratatui::{backend::CrosstermBackend, Terminal};
use reqwest::Client;
use std::io;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::load()?;
    logging::init(&config.log_file)?;
    tracing::info!(
        "starting with users at {} and products at {}",
        config.endpoints.users,
        config.endpoints.products
    );

    let client = Client::new();

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let app = App::new(&config);

    let res = ui::run_app(&mut terminal, app, client, config.endpoints.clone()).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!("terminal loop failed: {}", err);
        eprintln!("Error: {:?}", err);
    }

    tracing::info!("shutting down");
    Ok(())
}
