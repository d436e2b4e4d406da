use std::{sync::Arc, thread, time::Duration};

use anyhow::Result;
use log::{debug, info, warn};

use crate::{
    datasource::{
        config_parser::{HotplugConfig, config_read},
        cpu_topology::CpuTopology,
        cpufreq::CpuFreq,
        file_path::CONF_THREAD,
    },
    model::governor::Governor,
    utils::{file_operate::check_read_simple, inotify::NodeWatcher},
};

/// 将配置写入控制器：先更新参数，再按需启停
pub fn apply_config<H>(governor: &Governor<H>, config: &HotplugConfig) -> Result<()>
where
    H: CpuFreq + CpuTopology + 'static,
{
    governor.update_tunables(|tunables| {
        let rejected = config.tunables.apply(tunables);
        if rejected > 0 {
            warn!("{rejected} tunable(s) rejected, previous values kept");
        }
        Ok(())
    })?;

    governor.set_enabled(config.enabled)
}

pub fn monitor_config<H>(governor: Arc<Governor<H>>, config_file: &str) -> Result<()>
where
    H: CpuFreq + CpuTopology + 'static,
{
    info!("{CONF_THREAD} Start");

    while !check_read_simple(config_file) {
        debug!("Config file does not exist yet: {config_file}");
        thread::sleep(Duration::from_secs(10));
    }
    info!("Using Config: {config_file}");

    let mut watcher = NodeWatcher::new(config_file)?;

    loop {
        match watcher.wait_for_change() {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!("Inotify error in config monitor: {e}");
                thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        debug!("{} changed, reloading", watcher.path().display());
        match config_read(config_file) {
            Ok(config) => {
                if let Err(e) = apply_config(&governor, &config) {
                    warn!("Failed to apply config: {e:#}");
                }
            }
            Err(e) => warn!("Keeping previous config: {e:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        datasource::config_parser::parse_config,
        model::{testing::FakeCpu, tunables::Tunables},
    };

    fn governor() -> Governor<FakeCpu> {
        Governor::new(FakeCpu::new(2_000_000, &[1_000_000; 4]), Tunables::new(4))
            .with_startup_delay(Duration::from_secs(30))
    }

    #[test_log::test]
    fn config_starts_and_stops_governor() {
        let gov = governor();

        apply_config(&gov, &parse_config("enabled = true\n[tunables]\ncycle_up = 5\n").unwrap()).unwrap();
        assert!(gov.enabled());
        assert_eq!(gov.tunables().cycle_up(), 5);

        // 参数变化不会重启控制器
        gov.run_cycle_now();
        apply_config(&gov, &parse_config("enabled = true\n[tunables]\ncycle_up = 6\n").unwrap()).unwrap();
        assert_eq!(gov.cycle_counter(), Some(1));
        assert_eq!(gov.tunables().cycle_up(), 6);

        apply_config(&gov, &parse_config("enabled = false\n").unwrap()).unwrap();
        assert!(!gov.enabled());
        assert_eq!(gov.tunables().cycle_up(), 6);
    }

    #[test_log::test]
    fn rejected_values_do_not_block_enable() {
        let gov = governor();

        apply_config(&gov, &parse_config("enabled = true\n[tunables]\ndelay = 1\n").unwrap()).unwrap();
        assert!(gov.enabled());
        assert_eq!(gov.tunables().delay_ms(), 50);

        gov.set_enabled(false).unwrap();
    }
}
