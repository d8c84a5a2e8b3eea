use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_FILE_NAME: &str = "jobtable.log";

/// Where logs go while a full-screen view is up.
pub fn default_log_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "jobtable").map(|dirs| dirs.data_local_dir().join(LOG_FILE_NAME))
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

fn builder(verbosity: u8, log_file: Option<&Path>) -> Builder {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level_for(verbosity))
        .parse_default_env();

    if let Some(path) = log_file {
        let opened = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| OpenOptions::new().create(true).append(true).open(path));
        match opened {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            // Nowhere safe to write: stay quiet rather than draw over the screen.
            Err(_) => {
                builder.filter(None, LevelFilter::Off);
            }
        }
    }
    builder
}

/// Stderr logging, or `log_file` when given; `-v` raises the level, `RUST_LOG` overrides both.
pub fn init(verbosity: u8, log_file: Option<&Path>) {
    builder(verbosity, log_file).init();
    log::debug!("Logger initialized at {}", level_for(verbosity));
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Log, Record};

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(5), LevelFilter::Debug);
    }

    #[test]
    fn test_log_file_target_keeps_stderr_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(LOG_FILE_NAME);
        let logger = builder(0, Some(&path)).build();

        logger.log(
            &Record::builder()
                .args(format_args!("Server responded 404"))
                .level(Level::Warn)
                .target("jobtable")
                .build(),
        );
        logger.flush();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[WARN] - Server responded 404"));
    }
}
