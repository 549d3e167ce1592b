use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use std::fs;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "operator.log";

/// Crates whose debug output drowns the reconcile logs.
const QUIET_TARGETS: [&str; 6] = ["hyper", "hyper_util", "kube_client", "kube_runtime", "tower", "rustls"];

/// Initializes the global logger.
///
/// Call once at the very beginning of `main`. The level is taken from
/// `RUST_LOG` (`info` when unset). Records go to stderr with colored levels
/// and to `logs/operator.log` without colors.
///
/// Library code logs through `tracing`; its `log` feature forwards every event
/// into this dispatch.
pub fn init() {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("Failed to create log directory at '{}': {}", LOG_DIR, e);
    }

    let log_file_path = format!("{}/{}", LOG_DIR, LOG_FILE);

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let log_level_filter = log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);

    let mut base_config = Dispatch::new().level(log_level_filter);
    for target in QUIET_TARGETS {
        base_config = base_config.level_for(target, LevelFilter::Warn);
    }

    let console_config = Dispatch::new()
        .format(|out, message, record| {
            let colors = fern::colors::ColoredLevelConfig::new()
                .error(fern::colors::Color::Red)
                .warn(fern::colors::Color::Yellow)
                .info(fern::colors::Color::Green)
                .debug(fern::colors::Color::Blue)
                .trace(fern::colors::Color::BrightBlack);

            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    let file_config = match fern::log_file(&log_file_path) {
        Ok(file) => Some(
            Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("[{} {} {}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), record.level(), record.target(), message))
                })
                .chain(file),
        ),
        Err(e) => {
            eprintln!("Failed to open log file '{}': {}. Logging to console only.", log_file_path, e);
            None
        }
    };

    let mut dispatch = base_config.chain(console_config);
    if let Some(file_config) = file_config {
        dispatch = dispatch.chain(file_config);
    }

    dispatch.apply().unwrap_or_else(|e| {
        eprintln!("Failed to apply logger configuration: {}", e);
    });

    log::info!("Logger initialized. Logging to console and '{}'.", log_file_path);
}
