use activity_map::app::{start, DriverCommand};
use activity_map::config::{load_config, save_default_config};
use activity_map::constants::{CONFIG_PATH, DATA_DIR};
use activity_map::logging::{init_logging, install_panic_hook, log_error};
use activity_map::viewport::MapOutputs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

fn spawn_output_logger(outputs: MapOutputs) {
    let MapOutputs {
        mut annotations,
        mut viewport,
        mut loading,
        mut notices,
    } = outputs;

    tokio::spawn(async move {
        while annotations.changed().await.is_ok() {
            let current = annotations.borrow_and_update();
            info!(
                "Annotations: {} clusters, {} event clusters",
                current.clusters.len(),
                current.event_clusters.len()
            );
        }
    });

    tokio::spawn(async move {
        while viewport.changed().await.is_ok() {
            let current = *viewport.borrow_and_update();
            if !current.positioned_by_user {
                info!("Camera moved to {:?}", current.visible_rect);
            }
        }
    });

    tokio::spawn(async move {
        while loading.changed().await.is_ok() {
            info!("Loading: {}", *loading.borrow_and_update());
        }
    });

    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            warn!("Notice: {}", notice.message);
        }
    });
}

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--init-config") {
        match save_default_config(&CONFIG_PATH) {
            Ok(_) => {
                println!("Default configuration saved to {:?}", *CONFIG_PATH);
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("Failed to save default configuration: {}", e);
                std::process::exit(1);
            }
        }
    }

    init_logging();
    install_panic_hook();

    let config = load_config(&CONFIG_PATH);
    std::fs::create_dir_all(&*DATA_DIR).ok();

    let (app, outputs) = match start(&config) {
        Ok(started) => started,
        Err(e) => {
            log_error("Failed to start activity map", &e);
            std::process::exit(1);
        }
    };
    info!("Activity map v{} reading commands from stdin", activity_map::VERSION);

    spawn_output_logger(outputs);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log_error("Failed to read stdin", &e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match DriverCommand::parse(line) {
            Ok(command) => command.apply(&app).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Ignoring command {:?}: {}", line, e);
        }
    }

    info!("Input closed, shutting down");
    app.video_worker.abort();
}
