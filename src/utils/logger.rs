use colored::Colorize;
use env_logger::Builder;
use log::Level;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Colored stderr logging; with `log_file`, the same lines (uncolored, timestamped) are appended there.
pub fn setup_logging(verbose: bool, log_file: Option<&Path>) {
    use log::LevelFilter;

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let file: Option<Arc<Mutex<File>>> = log_file.and_then(|p| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(p)
            .map_err(|e| eprintln!("cannot open log file {}: {}", p.display(), e))
            .ok()
            .map(|f| Arc::new(Mutex::new(f)))
    });

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn) // Default: only warnings from dependencies
        .filter_module(env!("CARGO_PKG_NAME"), level) // Our crate: use requested level
        .format(move |buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        _ => "ERROR".red(),
                    };
                    let path = record.target().to_string().white();
                    format!("[{} {} {}] {}", name.cyan(), level_str, path, record.args())
                }
                _ => format!("[{}] {}", name.cyan(), record.args()),
            };
            if let Some(f) = &file
                && let Ok(mut f) = f.lock()
            {
                let _ = writeln!(
                    f,
                    "{} {} {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.args()
                );
            }
            writeln!(buf, "{}", line)
        })
        .try_init();
}
