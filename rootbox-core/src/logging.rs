use env_logger::Target;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Initialise logging at info level (`RUST_LOG` still wins).
///
/// With `log_file` set, logs are appended there; if the file cannot be
/// opened we fall back to stderr rather than failing the run.
pub fn init_with(log_file: Option<PathBuf>) {
    let target = match log_file.as_deref().map(open_log) {
        Some(Ok(file)) => Target::Pipe(Box::new(file)),
        Some(Err(_)) | None => Target::Stderr,
    };

    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(target)
        .try_init();
}

pub fn init() {
    init_with(None);
}

fn open_log(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
