use std::{fs, time::Duration};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;

use crate::{
    datasource::file_path::SCREEN_STATE_PATH,
    model::tunables::Tunables,
    utils::constants::hotplug::STARTUP_DELAY_MS,
};

#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
pub struct HotplugConfig {
    #[serde(default)]
    pub enabled: bool,
    /// 首个周期前的等待时间（ms），只在进程启动时读取
    pub startup_delay: Option<u64>,
    #[serde(default)]
    pub tunables: TunablesConfig,
    #[serde(default)]
    pub power: PowerConfig,
}

/// 配置文件中的可调参数，缺省的键保持当前值
#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
pub struct TunablesConfig {
    pub delay: Option<u32>,
    pub scroff_single_core: Option<bool>,
    pub min_cpus: Option<u32>,
    pub max_cpus: Option<u32>,
    pub cpufreq_up: Option<u32>,
    pub cpufreq_down: Option<u32>,
    pub cycle_up: Option<u32>,
    pub cycle_down: Option<u32>,
}

#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
pub struct PowerConfig {
    pub state_node: Option<String>,
}

impl HotplugConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay.unwrap_or(STARTUP_DELAY_MS))
    }
}

impl PowerConfig {
    pub fn state_node(&self) -> &str {
        self.state_node.as_deref().unwrap_or(SCREEN_STATE_PATH)
    }
}

fn apply_one(name: &str, result: Result<()>, rejected: &mut usize) {
    if let Err(e) = result {
        warn!("Rejected {name}: {e}");
        *rejected += 1;
    }
}

impl TunablesConfig {
    /// 逐项写入，校验失败的项记录警告并跳过，返回被拒绝的项数
    pub fn apply(&self, tunables: &mut Tunables) -> usize {
        let mut rejected = 0;

        if let Some(delay) = self.delay {
            apply_one("delay", tunables.set_delay_ms(delay), &mut rejected);
        }
        if let Some(scroff) = self.scroff_single_core {
            tunables.set_single_core_on_screen_off(scroff);
        }

        match (self.min_cpus, self.max_cpus) {
            (Some(min), Some(max)) => {
                apply_one("min_cpus/max_cpus", tunables.set_core_limits(min, max), &mut rejected)
            }
            (Some(min), None) => apply_one("min_cpus", tunables.set_min_cores(min), &mut rejected),
            (None, Some(max)) => apply_one("max_cpus", tunables.set_max_cores(max), &mut rejected),
            (None, None) => {}
        }

        if let Some(up) = self.cpufreq_up {
            apply_one("cpufreq_up", tunables.set_freq_up_pct(up), &mut rejected);
        }
        if let Some(down) = self.cpufreq_down {
            apply_one("cpufreq_down", tunables.set_freq_down_pct(down), &mut rejected);
        }
        if let Some(cycles) = self.cycle_up {
            apply_one("cycle_up", tunables.set_cycle_up(cycles), &mut rejected);
        }
        if let Some(cycles) = self.cycle_down {
            apply_one("cycle_down", tunables.set_cycle_down(cycles), &mut rejected);
        }

        rejected
    }
}

pub fn parse_config(content: &str) -> Result<HotplugConfig> {
    toml::from_str(content).with_context(|| "Failed to parse hotplug config")
}

pub fn config_read(config_file: &str) -> Result<HotplugConfig> {
    let content = fs::read_to_string(config_file)
        .with_context(|| format!("Failed to open config file: {config_file}"))?;
    let config = parse_config(&content)?;

    info!(
        "Load config succeed: enabled={}, state_node={}",
        config.enabled,
        config.power.state_node()
    );
    Ok(config)
}
