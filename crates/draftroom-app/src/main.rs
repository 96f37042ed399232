// Draft room entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, stdout is the console)
// 2. Load config
// 3. Open database
// 4. Load the player pool
// 5. Open the draft room (replays stored picks)
// 6. Subscribe to the realtime feed
// 7. Spawn the event loop and the output printer
// 8. Read commands from stdin until quit
// 9. Cleanup on exit

use std::sync::Arc;
use std::time::Duration;

use draftroom_app::{app, console};
use draftroom_core::config;
use draftroom_core::db::Database;
use draftroom_core::players;
use draftroom_core::realtime::{NotifyingStore, PickFeed};
use draftroom_core::room::{DraftRoom, RoomSetup};
use draftroom_core::store::DraftStore;

use anyhow::Context;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Draft room starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: event={}, format={}, {} teams",
        config.draft.event_id,
        config.draft.format,
        config.teams.len()
    );

    // 3. Open database
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let db_path = config.db_path.to_string_lossy().into_owned();
    let db = Database::open(&db_path).context("failed to open database")?;
    info!("Database opened at {}", db_path);

    // 4. Load the player pool
    let players = players::load_players(&config.players_path())
        .context("failed to load player pool")?;

    // 5. Open the draft room behind the notifying store
    let client_id = config.draft.resolved_client_id();
    let feed = PickFeed::default();
    let db: Arc<dyn DraftStore> = Arc::new(db);
    let store: Arc<dyn DraftStore> = Arc::new(NotifyingStore::new(db, feed.clone(), client_id.clone()));

    let setup = RoomSetup {
        event_id: config.draft.event_id.clone(),
        format: config.draft.format,
        teams: config.build_teams(),
        players,
    };
    let room = DraftRoom::open(setup, store)
        .await
        .context("failed to open draft session")?;
    info!(
        "Session {} ready as client {} ({})",
        room.session().id,
        client_id,
        room.phase()
    );

    // 6. Subscribe to changes made by other clients
    let subscription = feed.subscribe(room.session().id, client_id);

    // 7. Channels and background tasks
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let printer = tokio::spawn(async move {
        if let Err(e) = console::print_updates(ui_rx, tokio::io::stdout()).await {
            error!("Output error: {}", e);
        }
    });

    let console_ui_tx = ui_tx.clone();
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(cmd_rx, ui_tx, room, subscription).await {
            error!("Application loop error: {}", e);
        }
    });

    // 8. Read commands until quit or end of input
    let stdin = BufReader::new(tokio::io::stdin());
    if let Err(e) = console::read_commands(stdin, cmd_tx, console_ui_tx).await {
        error!("Input error: {}", e);
    }

    // 9. Cleanup: wait for the event loop, then let the printer drain
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;
    let _ = tokio::time::timeout(Duration::from_secs(2), printer).await;

    info!("Draft room shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (stdout is reserved for the console).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("draftroom.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("draftroom=info,draftroom_core=info,draftroom_app=info,warn")),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
