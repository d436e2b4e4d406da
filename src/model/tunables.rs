use std::{fmt, str::FromStr};

use anyhow::{Context, Result, anyhow, bail};
use log::debug;

use crate::utils::constants::tunable::*;

/// 可调参数 - 热插拔策略的全部配置
/// 每个 setter 都会先校验边界，校验失败时保留原值
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tunables {
    delay_ms: u32,
    single_core_on_screen_off: bool,
    min_cores: u32,
    max_cores: u32,
    freq_up_pct: u32,
    freq_down_pct: u32,
    cycle_up: u32,
    cycle_down: u32,
    /// 拓扑大小，max_cores 的上限
    nr_cpus: u32,
}

fn check_range(name: &str, value: u32, (low, high): (u32, u32)) -> Result<()> {
    if value < low || value > high {
        bail!("{name}={value} out of range [{low}, {high}]");
    }
    Ok(())
}

impl Tunables {
    pub fn new(nr_cpus: u32) -> Self {
        let nr_cpus = nr_cpus.max(1);
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            single_core_on_screen_off: DEFAULT_SCROFF_SINGLE_CORE,
            min_cores: DEFAULT_MIN_CPUS.min(nr_cpus),
            max_cores: nr_cpus,
            freq_up_pct: DEFAULT_CPUFREQ_UP,
            freq_down_pct: DEFAULT_CPUFREQ_DOWN,
            cycle_up: DEFAULT_CYCLE_UP,
            cycle_down: DEFAULT_CYCLE_DOWN,
            nr_cpus,
        }
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }
    pub fn single_core_on_screen_off(&self) -> bool {
        self.single_core_on_screen_off
    }
    pub fn min_cores(&self) -> u32 {
        self.min_cores
    }
    pub fn max_cores(&self) -> u32 {
        self.max_cores
    }
    pub fn freq_up_pct(&self) -> u32 {
        self.freq_up_pct
    }
    pub fn freq_down_pct(&self) -> u32 {
        self.freq_down_pct
    }
    pub fn cycle_up(&self) -> u32 {
        self.cycle_up
    }
    pub fn cycle_down(&self) -> u32 {
        self.cycle_down
    }
    pub fn nr_cpus(&self) -> u32 {
        self.nr_cpus
    }

    pub fn set_delay_ms(&mut self, delay_ms: u32) -> Result<()> {
        check_range("delay", delay_ms, DELAY_RANGE)?;
        self.delay_ms = delay_ms;
        debug!("Set delay to: {delay_ms}ms");
        Ok(())
    }

    pub fn set_single_core_on_screen_off(&mut self, enabled: bool) {
        self.single_core_on_screen_off = enabled;
        debug!("Set single core on screen off: {enabled}");
    }

    pub fn set_min_cores(&mut self, min_cores: u32) -> Result<()> {
        check_range("min_cpus", min_cores, (1, self.max_cores))?;
        self.min_cores = min_cores;
        debug!("Set min cpus to: {min_cores}");
        Ok(())
    }

    pub fn set_max_cores(&mut self, max_cores: u32) -> Result<()> {
        check_range("max_cpus", max_cores, (self.min_cores, self.nr_cpus))?;
        self.max_cores = max_cores;
        debug!("Set max cpus to: {max_cores}");
        Ok(())
    }

    /// 同时设置上下限，按照能让两者一起生效的顺序写入
    /// 任一失败时两个值都保持不变
    pub fn set_core_limits(&mut self, min_cores: u32, max_cores: u32) -> Result<()> {
        let mut next = *self;
        if min_cores > next.max_cores {
            next.set_max_cores(max_cores)?;
            next.set_min_cores(min_cores)?;
        } else {
            next.set_min_cores(min_cores)?;
            next.set_max_cores(max_cores)?;
        }
        *self = next;
        Ok(())
    }

    pub fn set_freq_up_pct(&mut self, pct: u32) -> Result<()> {
        check_range("cpufreq_up", pct, PERCENT_RANGE)?;
        self.freq_up_pct = pct;
        debug!("Set cpufreq up threshold to: {pct}%");
        Ok(())
    }

    pub fn set_freq_down_pct(&mut self, pct: u32) -> Result<()> {
        check_range("cpufreq_down", pct, PERCENT_RANGE)?;
        self.freq_down_pct = pct;
        debug!("Set cpufreq down threshold to: {pct}%");
        Ok(())
    }

    pub fn set_cycle_up(&mut self, cycles: u32) -> Result<()> {
        check_range("cycle_up", cycles, CYCLE_RANGE)?;
        self.cycle_up = cycles;
        debug!("Set cycle up to: {cycles}");
        Ok(())
    }

    pub fn set_cycle_down(&mut self, cycles: u32) -> Result<()> {
        check_range("cycle_down", cycles, CYCLE_RANGE)?;
        self.cycle_down = cycles;
        debug!("Set cycle down to: {cycles}");
        Ok(())
    }

    /// 以文本形式读取单个参数
    pub fn show(&self, tunable: Tunable) -> String {
        match tunable {
            Tunable::Delay => self.delay_ms.to_string(),
            Tunable::ScroffSingleCore => u8::from(self.single_core_on_screen_off).to_string(),
            Tunable::MinCpus => self.min_cores.to_string(),
            Tunable::MaxCpus => self.max_cores.to_string(),
            Tunable::CpufreqUp => self.freq_up_pct.to_string(),
            Tunable::CpufreqDown => self.freq_down_pct.to_string(),
            Tunable::CycleUp => self.cycle_up.to_string(),
            Tunable::CycleDown => self.cycle_down.to_string(),
        }
    }

    /// 以文本形式写入单个参数，走与 typed setter 相同的校验
    pub fn store(&mut self, tunable: Tunable, value: &str) -> Result<()> {
        let value = value
            .trim()
            .parse::<u32>()
            .with_context(|| format!("Invalid value for {tunable}: {:?}", value.trim()))?;

        match tunable {
            Tunable::Delay => self.set_delay_ms(value),
            Tunable::ScroffSingleCore => {
                check_range("scroff_single_core", value, (0, 1))?;
                self.set_single_core_on_screen_off(value == 1);
                Ok(())
            }
            Tunable::MinCpus => self.set_min_cores(value),
            Tunable::MaxCpus => self.set_max_cores(value),
            Tunable::CpufreqUp => self.set_freq_up_pct(value),
            Tunable::CpufreqDown => self.set_freq_down_pct(value),
            Tunable::CycleUp => self.set_cycle_up(value),
            Tunable::CycleDown => self.set_cycle_down(value),
        }
    }
}

/// 参数名，对应配置文件里的键名
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tunable {
    Delay,
    ScroffSingleCore,
    MinCpus,
    MaxCpus,
    CpufreqUp,
    CpufreqDown,
    CycleUp,
    CycleDown,
}

impl Tunable {
    pub const ALL: [Tunable; 8] = [
        Tunable::Delay,
        Tunable::ScroffSingleCore,
        Tunable::MinCpus,
        Tunable::MaxCpus,
        Tunable::CpufreqUp,
        Tunable::CpufreqDown,
        Tunable::CycleUp,
        Tunable::CycleDown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tunable::Delay => "delay",
            Tunable::ScroffSingleCore => "scroff_single_core",
            Tunable::MinCpus => "min_cpus",
            Tunable::MaxCpus => "max_cpus",
            Tunable::CpufreqUp => "cpufreq_up",
            Tunable::CpufreqDown => "cpufreq_down",
            Tunable::CycleUp => "cycle_up",
            Tunable::CycleDown => "cycle_down",
        }
    }
}

impl fmt::Display for Tunable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tunable {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Tunable::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| anyhow!("Unknown tunable: {s}"))
    }
}
