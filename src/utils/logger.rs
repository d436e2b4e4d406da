use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use log::{LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;

use crate::datasource::file_path::{LOG_LEVEL_PATH, LOG_PATH};

// 控制台日志，由外部脚本重定向到 LOG_PATH
struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        // 实际的过滤由 log 库根据 max_level 完成
        true
    }

    fn log(&self, record: &Record) {
        print!("{}", format_record(record));
    }

    // stdout 按行缓冲，每条日志以换行结尾
    fn flush(&self) {}
}

fn format_record(record: &Record) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}][{}]: {}\n", timestamp, record.level(), record.args())
}

static LOGGER: Lazy<ConsoleLogger> = Lazy::new(|| ConsoleLogger);

pub fn init_logger() -> Result<()> {
    let log_level = read_log_level_config();

    log::set_logger(&*LOGGER)
        .map(|()| log::set_max_level(log_level))
        .with_context(|| "Failed to set logger")?;

    log::info!("Logger initialized with level: {}", log_level);
    log::info!("Log file path (redirected stdout): {}", LOG_PATH);
    log::info!("Log level config path: {}", LOG_LEVEL_PATH);

    Ok(())
}

/// 解析日志等级文本，无法识别时返回 None
pub fn parse_log_level(content: &str) -> Option<LevelFilter> {
    match content.trim().to_lowercase().as_str() {
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        _ => None,
    }
}

// 读取日志等级配置文件，缺失或无法识别时使用 Info
pub fn read_log_level_config() -> LevelFilter {
    let default_level = LevelFilter::Info;

    if !Path::new(LOG_LEVEL_PATH).exists() {
        return default_level;
    }

    match std::fs::read_to_string(LOG_LEVEL_PATH) {
        Ok(content) => parse_log_level(&content).unwrap_or(default_level),
        Err(_) => default_level,
    }
}

pub fn update_log_level() {
    let new_level = read_log_level_config();
    if new_level != log::max_level() {
        log::set_max_level(new_level);
        log::info!("Log level updated to: {}", new_level);
    }
}
