use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use jules_client::HttpBackend;
use jules_config::ConfigManager;
use jules_observability::{session_span, LogManager};
use jules_session::{ChatSession, SessionOptions};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn, Instrument};

mod app;
mod ui;

use app::{App, KeyAction};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let manager = ConfigManager::load_default().await?;
    let config = manager.snapshot().await;

    // The terminal belongs to the UI, logs always go to a file
    let mut observability = jules_observability::Config::from(&config);
    if observability.logging.file_path.is_none() {
        if let Some(path) = jules_config::default_log_path() {
            observability = observability.with_log_file(path);
        }
    }
    let log_manager = LogManager::new(&observability).await?;

    let server_url = std::env::args().nth(1);
    let base = config.api.resolve_base(server_url.as_deref());
    let backend = HttpBackend::from_api_base(&base, config.api.request_timeout())?;
    let origin = backend.origin().to_string();
    if let Err(e) = backend.health_check().await {
        warn!(%origin, error = %e, "Backend not reachable at startup");
    }

    let options = SessionOptions::default()
        .with_locale(config.chat.locale)
        .with_upload_policy(config.upload.policy());
    let session = ChatSession::new(Arc::new(backend), options);
    let span = session_span(session.session_id());
    span.in_scope(|| info!(%origin, "Starting TUI"));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let mut app = App::new(session, origin);
    let res = run_app(&mut terminal, &mut app).instrument(span).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    log_manager.shutdown();
    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    let mut keys = EventStream::new();
    let mut session_events = app.session.subscribe();
    // Banners expire without an event
    let mut tick = tokio::time::interval(tokio::time::Duration::from_millis(250));

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        tokio::select! {
            event = keys.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if app.handle_key(key) == KeyAction::Quit {
                        return Ok(());
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
            event = session_events.recv() => match event {
                Ok(event) => app.on_session_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "UI lagged behind session events");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = tick.tick() => {}
        }

        app.drain_notices();
    }
}
