//! Structured logging, level driven by `RUST_LOG` (spec §6 ambient
//! stack). Console output is always on; the plain-text file sink under
//! `log_dir` is best-effort and silently skipped if the directory can't
//! be created, since a misconfigured log path shouldn't stop the
//! scheduler from starting.

use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use std::fs;

const LOG_FILE: &str = "lease_scheduler.log";

/// Initializes the global logger, writing to the console and to
/// `<log_dir>/lease_scheduler.log`. Call once, before anything else in
/// `main` touches `log::*`.
pub fn init(log_dir: &str) {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let level_filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);

    let dispatch = Dispatch::new()
        .level(level_filter)
        .level_for("serde_json", LevelFilter::Warn)
        .level_for("uuid", LevelFilter::Warn)
        .chain(console_sink());

    let dispatch = match file_sink(log_dir) {
        Ok(sink) => dispatch.chain(sink),
        Err(e) => {
            eprintln!("log file under '{log_dir}' unavailable ({e}), logging to console only");
            dispatch
        }
    };

    if let Err(e) = dispatch.apply() {
        eprintln!("failed to install logger: {e}");
    }

    log::info!("logger initialized, level={level_filter}, log_dir={log_dir}");
}

fn console_sink() -> Dispatch {
    Dispatch::new()
        .format(|out, message, record| {
            let colors = fern::colors::ColoredLevelConfig::new()
                .error(fern::colors::Color::Red)
                .warn(fern::colors::Color::Yellow)
                .info(fern::colors::Color::Green)
                .debug(fern::colors::Color::Blue)
                .trace(fern::colors::Color::BrightBlack);

            out.finish(format_args!("[{} {} {}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), colors.color(record.level()), record.target(), message))
        })
        .chain(std::io::stderr())
}

fn file_sink(log_dir: &str) -> std::io::Result<Dispatch> {
    fs::create_dir_all(log_dir)?;
    let path = format!("{log_dir}/{LOG_FILE}");
    let file = fern::log_file(&path)?;
    Ok(Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{} {} {}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), record.level(), record.target(), message)))
        .chain(file))
}
