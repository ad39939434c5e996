//! `log` のバックエンド
//!
//! 標準エラー出力と (指定があれば) ログファイルに書く。
//!
//! ```text
//! INFO [1s 250ms] avatar_tracking::device::manager - Using device 'HMD' as Head
//! ```

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use humantime::format_duration;
use log::{LevelFilter, Metadata, Record};

pub struct StderrLogger {
    start: Instant,
    file_writer: Mutex<Option<BufWriter<std::fs::File>>>,
}

impl StderrLogger {
    fn new(log_file: Option<&Path>) -> Self {
        let file_writer = log_file.and_then(|path| {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .ok()
                .map(BufWriter::new)
        });

        Self {
            start: Instant::now(),
            file_writer: Mutex::new(file_writer),
        }
    }

    fn elapsed(&self) -> Duration {
        // ミリ秒まで
        let elapsed = self.start.elapsed();
        Duration::from_millis(elapsed.as_millis() as u64)
    }
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!(
            "{} [{}] {} - {}\n",
            record.level(),
            format_duration(self.elapsed()),
            record.target(),
            record.args()
        );

        let _ = io::stderr().write_all(line.as_bytes());

        if let Ok(mut guard) = self.file_writer.lock() {
            if let Some(writer) = guard.as_mut() {
                let _ = writer.write_all(line.as_bytes());
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.file_writer.lock() {
            if let Some(writer) = guard.as_mut() {
                let _ = writer.flush();
            }
        }
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// グローバルロガーを設定する。二度目以降はエラー
pub fn init(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let logger = LOGGER.get_or_init(|| StderrLogger::new(log_file));
    log::set_logger(logger).map_err(|e| anyhow!("Failed to initialize logger: {e}"))?;
    log::set_max_level(level);
    Ok(())
}
