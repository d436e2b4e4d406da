use std::{thread, time::Duration};

use anyhow::Result;
use log::{debug, info, warn};

use crate::{
    datasource::file_path::{LOG_LEVEL_PATH, LOG_LEVEL_THREAD},
    utils::{file_operate::check_read_simple, inotify::NodeWatcher, logger::update_log_level},
};

pub fn monitor_log_level() -> Result<()> {
    info!("{LOG_LEVEL_THREAD} Start");

    // 日志等级文件可能由模块脚本稍后创建
    while !check_read_simple(LOG_LEVEL_PATH) {
        debug!("Log level file does not exist yet: {LOG_LEVEL_PATH}");
        thread::sleep(Duration::from_secs(10));
    }
    info!("Using log level path: {LOG_LEVEL_PATH}");
    update_log_level();

    let mut watcher = NodeWatcher::new(LOG_LEVEL_PATH)?;

    loop {
        match watcher.wait_for_change() {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!("Inotify error in log level monitor: {e}");
                thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        if !check_read_simple(LOG_LEVEL_PATH) {
            debug!("Log level file no longer exists");
            continue;
        }

        update_log_level();
    }
}
