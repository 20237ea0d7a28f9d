//! Console + rolling file logging setup, configured from [`crate::config::RuntimeConfig`].

use log::LevelFilter;
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

const PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S)}] {h({l})} {t} - {m}{n}";

/// Initializes the global logger. Panics (via `log4rs`'s own handle) are
/// not tolerated here: a bad logging config should surface immediately
/// since nothing downstream can report it otherwise.
pub fn setup(level: LevelFilter, log_file: Option<&str>) {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let mut builder = Config::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root = Root::builder().appender("console");

    if let Some(path) = log_file {
        match FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(path)
        {
            Ok(file) => {
                builder = builder.appender(Appender::builder().build("file", Box::new(file)));
                root = root.appender("file");
            }
            Err(err) => {
                eprintln!("failed to open log file {path}: {err}, continuing console-only");
            }
        }
    }

    let config = builder
        .build(root.build(level))
        .expect("logging configuration is always valid");

    log4rs::init_config(config).expect("logger already initialized");
    log_panics::init();
}
