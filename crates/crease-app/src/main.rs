// crease entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Connect the backend (seeding the local store if selected)
// 4. Reconcile enrollment and load the builder
// 5. Spawn the stdin reader thread and the printer task
// 6. Run the command loop until quit, EOF or Ctrl+C

use crease_app::{app, backend, config, render};
use crease_core::enrollment::MountGuard;
use crease_core::session::{PageView, TeamBuilder};

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("crease starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: backend={:?}, contest={:?}",
        config.backend.kind, config.session.contest_id
    );

    let api = backend::connect(&config).context("failed to connect backend")?;

    let mount = MountGuard::new();
    let opts = config.session.options();
    let view = tokio::select! {
        view = TeamBuilder::load(api, config.session.contest(), &opts, &mount) => {
            view.context("failed to load the team builder")?
        }
        _ = tokio::signal::ctrl_c() => {
            mount.detach();
            info!("Interrupted while loading");
            return Ok(());
        }
    };

    let builder = match view {
        PageView::Builder(b) => *b,
        PageView::ViewOnly {
            reconciliation,
            team,
        } => {
            print!("{}", render::view_only(&reconciliation, &team));
            return Ok(());
        }
        PageView::SupportNeeded { reconciliation } => {
            print!("{}", render::support_needed(&reconciliation));
            return Ok(());
        }
    };

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (out_tx, mut out_rx) = mpsc::channel::<String>(256);

    // A plain thread: a pending stdin read must not hold up runtime shutdown.
    let input_out = out_tx.clone();
    std::thread::spawn(move || {
        if let Err(e) = app::read_commands(std::io::stdin().lock(), cmd_tx, input_out) {
            error!("Input error: {}", e);
        }
    });

    let printer_handle = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            println!("{}", text.trim_end());
        }
    });

    tokio::select! {
        result = app::run(cmd_rx, out_tx, builder) => {
            if let Err(e) = result {
                error!("Command loop error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    let _ = tokio::time::timeout(std::time::Duration::from_secs(1), printer_handle).await;

    info!("crease shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used for
/// the prompt).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("crease.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("crease=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
