use std::{sync::Arc, thread, time::Duration};

use anyhow::Result;
use log::{debug, info, warn};

use crate::{
    datasource::{cpu_topology::CpuTopology, cpufreq::CpuFreq, file_path::SCREEN_THREAD},
    model::governor::{Governor, PowerEvent},
    utils::{
        file_operate::{check_read_simple, read_node},
        inotify::NodeWatcher,
    },
};

/// 解析亮灭屏状态节点内容
pub fn parse_power_event(content: &str) -> Option<PowerEvent> {
    match content.trim().to_lowercase().as_str() {
        "0" | "off" | "suspend" => Some(PowerEvent::Suspend),
        "1" | "on" | "active" | "resume" => Some(PowerEvent::Resume),
        _ => None,
    }
}

/// 只在状态发生变化时返回事件
pub struct ScreenState {
    last: Option<PowerEvent>,
}

impl ScreenState {
    pub fn new(initial: Option<PowerEvent>) -> Self {
        Self { last: initial }
    }

    pub fn update(&mut self, content: &str) -> Option<PowerEvent> {
        let event = parse_power_event(content);
        if event.is_none() {
            debug!("Unknown screen state: {:?}", content.trim());
            return None;
        }
        if event == self.last {
            return None;
        }
        self.last = event;
        event
    }
}

/// 按启动时的节点内容初始化；控制器默认处于亮屏状态，灭屏时补发一次 Suspend
pub fn init_screen_state<H>(governor: &Governor<H>, content: Option<&str>) -> ScreenState
where
    H: CpuFreq + CpuTopology + 'static,
{
    let initial = content.and_then(parse_power_event);
    if initial == Some(PowerEvent::Suspend) {
        info!("Screen is off at startup");
        governor.notify(PowerEvent::Suspend);
    }
    ScreenState::new(initial)
}

pub fn monitor_screen_state<H>(governor: Arc<Governor<H>>, state_node: &str) -> Result<()>
where
    H: CpuFreq + CpuTopology + 'static,
{
    info!("{SCREEN_THREAD} Start");

    while !check_read_simple(state_node) {
        debug!("Screen state node does not exist yet: {state_node}");
        thread::sleep(Duration::from_secs(10));
    }
    info!("Using screen state node: {state_node}");

    let content = read_node(state_node).ok();
    let mut screen = init_screen_state(&governor, content.as_deref());
    let mut watcher = NodeWatcher::new(state_node)?;

    loop {
        match watcher.wait_for_change() {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!("Inotify error in screen state monitor: {e}");
                thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        let content = match read_node(state_node) {
            Ok(content) => content,
            Err(e) => {
                debug!("Failed to read screen state: {e}");
                continue;
            }
        };

        if let Some(event) = screen.update(&content) {
            info!("Screen state changed: {event:?}");
            governor.notify(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::{governor::PowerState, testing::FakeCpu, tunables::Tunables};

    #[test]
    fn parses_state_words() {
        assert_eq!(parse_power_event("0\n"), Some(PowerEvent::Suspend));
        assert_eq!(parse_power_event("OFF"), Some(PowerEvent::Suspend));
        assert_eq!(parse_power_event("suspend"), Some(PowerEvent::Suspend));
        assert_eq!(parse_power_event("1"), Some(PowerEvent::Resume));
        assert_eq!(parse_power_event(" on "), Some(PowerEvent::Resume));
        assert_eq!(parse_power_event("active"), Some(PowerEvent::Resume));
        assert_eq!(parse_power_event("dozing"), None);
    }

    #[test]
    fn only_changes_are_forwarded() {
        let mut screen = ScreenState::new(Some(PowerEvent::Resume));

        assert_eq!(screen.update("1"), None);
        assert_eq!(screen.update("0"), Some(PowerEvent::Suspend));
        assert_eq!(screen.update("off"), None);
        assert_eq!(screen.update("garbage"), None);
        assert_eq!(screen.update("on"), Some(PowerEvent::Resume));
    }

    fn governor() -> Governor<FakeCpu> {
        Governor::new(FakeCpu::new(2_000_000, &[1_000_000; 4]), Tunables::new(4))
            .with_startup_delay(Duration::from_secs(30))
    }

    #[test_log::test]
    fn screen_off_at_startup_suspends() {
        let gov = governor();
        gov.set_enabled(true).unwrap();

        let mut screen = init_screen_state(&gov, Some("0"));
        assert_eq!(gov.power_state(), PowerState::Suspended);
        assert_eq!(gov.hw().online(), vec![0]);

        // 同样的灭屏内容不会再次分发
        assert_eq!(screen.update("0"), None);
        assert_eq!(screen.update("1"), Some(PowerEvent::Resume));

        gov.set_enabled(false).unwrap();
    }

    #[test_log::test]
    fn screen_on_at_startup_keeps_controller_active() {
        let gov = governor();
        gov.set_enabled(true).unwrap();

        let mut screen = init_screen_state(&gov, Some("1"));
        assert_eq!(gov.power_state(), PowerState::Active);
        assert!(gov.hw().commands().is_empty());
        assert_eq!(screen.update("1"), None);

        let mut unreadable = init_screen_state(&gov, None);
        assert_eq!(gov.power_state(), PowerState::Active);
        assert_eq!(unreadable.update("1"), Some(PowerEvent::Resume));

        gov.set_enabled(false).unwrap();
    }

    #[test]
    fn first_known_state_is_forwarded_without_initial() {
        let mut screen = ScreenState::new(None);
        assert_eq!(screen.update("0"), Some(PowerEvent::Suspend));
    }
}
