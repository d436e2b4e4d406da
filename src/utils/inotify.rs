use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use inotify::{EventMask, Inotify, WatchDescriptor, WatchMask};
use log::debug;

const REWATCH_RETRY_MS: u64 = 500;
const REWATCH_ATTEMPTS: u32 = 20;

/// 单个节点文件的变化监控
/// 文件被替换（删除或移动）后自动重新建立监控
pub struct NodeWatcher {
    inotify: Inotify,
    path: PathBuf,
    wd: WatchDescriptor,
    watching: bool,
}

fn watch_mask() -> WatchMask {
    WatchMask::MODIFY | WatchMask::CLOSE_WRITE | WatchMask::DELETE_SELF | WatchMask::MOVE_SELF
}

impl NodeWatcher {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inotify = Inotify::init().with_context(|| "Failed to initialize inotify")?;
        let wd = inotify
            .watches()
            .add(&path, watch_mask())
            .with_context(|| format!("Failed to add watch for: {}", path.display()))?;

        Ok(Self {
            inotify,
            path,
            wd,
            watching: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 阻塞等待下一批事件，节点内容发生变化或被替换时返回 true
    pub fn wait_for_change(&mut self) -> Result<bool> {
        // 上一次重建监控失败，先恢复监控再报告变化
        if !self.watching {
            self.rewatch()?;
            return Ok(true);
        }

        let mut buffer = [0; 4096];
        let mut lost = false;
        let mut changed = false;

        {
            let events = self
                .inotify
                .read_events_blocking(&mut buffer)
                .with_context(|| "Failed to read inotify events")?;

            for event in events {
                if event.wd != self.wd {
                    continue;
                }
                if event.mask.intersects(
                    EventMask::IGNORED | EventMask::DELETE_SELF | EventMask::MOVE_SELF,
                ) {
                    lost = true;
                }
                if event.mask.intersects(EventMask::MODIFY | EventMask::CLOSE_WRITE) {
                    changed = true;
                }
            }
        }

        if lost {
            self.rewatch()?;
            changed = true;
        }

        if !changed {
            debug!("Ignoring unrelated inotify event for {}", self.path.display());
        }

        Ok(changed)
    }

    // 文件被替换后重新添加监控
    fn rewatch(&mut self) -> Result<()> {
        if self.watching {
            let _ = self.inotify.watches().remove(self.wd.clone());
            self.watching = false;
        }

        for attempt in 1..=REWATCH_ATTEMPTS {
            if self.path.exists() {
                self.wd = self
                    .inotify
                    .watches()
                    .add(&self.path, watch_mask())
                    .with_context(|| format!("Failed to re-add watch for: {}", self.path.display()))?;
                self.watching = true;
                debug!("Re-watching {} (attempt {attempt})", self.path.display());
                return Ok(());
            }
            thread::sleep(Duration::from_millis(REWATCH_RETRY_MS));
        }

        Err(anyhow::anyhow!(
            "Watched node disappeared: {}",
            self.path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn node(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("coresmp-inotify-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, "0").unwrap();
        path
    }

    #[test_log::test]
    fn reports_write_as_change() {
        let path = node("write");
        let mut watcher = NodeWatcher::new(&path).unwrap();

        fs::write(&path, "1").unwrap();
        assert!(watcher.wait_for_change().unwrap());
    }

    #[test_log::test]
    fn follows_replaced_node() {
        let path = node("replace");
        let mut watcher = NodeWatcher::new(&path).unwrap();

        fs::remove_file(&path).unwrap();
        fs::write(&path, "1").unwrap();
        assert!(watcher.wait_for_change().unwrap());

        // 新文件上的写入仍然可以收到
        fs::write(&path, "0").unwrap();
        assert!(watcher.wait_for_change().unwrap());
    }
}
