use anyhow::Result;
use log::{debug, info, warn};

use crate::{
    datasource::{cpu_topology::CpuTopology, cpufreq::CpuFreq},
    model::tunables::Tunables,
    utils::constants::hotplug::REFERENCE_CPU,
};

/// 控制器运行期状态，启动时创建，停止时丢弃
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControllerState {
    /// 距离上一次拓扑变化经过的周期数
    pub cycle_counter: u32,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 单个周期的决策结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// 上线了指定核心
    Upshift(u32),
    /// 下线了指定核心
    Downshift(u32),
    Hold,
}

/// 一次采样得到的频率快照（KHz）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadSnapshot {
    pub online: Vec<u32>,
    pub up_rate: u64,
    pub down_rate: u64,
    pub reference_rate: u64,
    /// 在线核心中的最低频率（包括参考核心）
    pub slow_rate: u64,
    /// 最低频率的非参考核心
    pub slow_cpu: Option<u32>,
    pub fast_rate: u64,
}

impl LoadSnapshot {
    /// 根据各核心频率构建快照
    /// `rates` 为 (cpu, 当前频率)，按 cpu 升序，包含参考核心
    pub fn from_rates(max_rate: u64, up_pct: u32, down_pct: u32, rates: &[(u32, u64)]) -> Option<Self> {
        let reference_rate = rates
            .iter()
            .find(|(cpu, _)| *cpu == REFERENCE_CPU)
            .map(|(_, rate)| *rate)?;

        let mut slow_rate = u64::MAX;
        let mut slow_cpu = None;
        let mut fast_rate = reference_rate;

        for &(cpu, rate) in rates.iter().filter(|(cpu, _)| *cpu != REFERENCE_CPU) {
            // 频率相同时取编号更大的核心
            if rate <= slow_rate {
                slow_rate = rate;
                slow_cpu = Some(cpu);
            }
            if rate > fast_rate {
                fast_rate = rate;
            }
        }

        if reference_rate < slow_rate {
            slow_rate = reference_rate;
        }

        Some(Self {
            online: rates.iter().map(|(cpu, _)| *cpu).collect(),
            up_rate: u64::from(up_pct) * max_rate / 100,
            down_rate: u64::from(down_pct) * max_rate / 100,
            reference_rate,
            slow_rate,
            slow_cpu,
            fast_rate,
        })
    }
}

/// 纯决策结论，尚未解析要上线的具体核心
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Upshift,
    Downshift(u32),
    Hold,
}

/// 热插拔决策引擎 - 每个周期采样一次并至多执行一次上线/下线
pub struct DecisionEngine;

impl DecisionEngine {
    /// 执行一个完整周期：计数、采样、决策、执行
    /// 采样或执行失败只记录日志，本周期放弃动作
    pub fn run_cycle<H>(state: &mut ControllerState, tunables: &Tunables, hw: &H) -> Decision
    where
        H: CpuFreq + CpuTopology + ?Sized,
    {
        state.cycle_counter = state.cycle_counter.saturating_add(1);

        let snapshot = match Self::sample(tunables, hw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Sampling failed, skipping cycle: {e:#}");
                return Decision::Hold;
            }
        };

        debug!(
            "cycle={} online={:?} ref={} slow={}({:?}) fast={} up={} down={}",
            state.cycle_counter,
            snapshot.online,
            snapshot.reference_rate,
            snapshot.slow_rate,
            snapshot.slow_cpu,
            snapshot.fast_rate,
            snapshot.up_rate,
            snapshot.down_rate
        );

        match Self::evaluate(state, tunables, &snapshot) {
            Verdict::Upshift => Self::upshift(state, &snapshot, hw),
            Verdict::Downshift(cpu) => Self::downshift(state, cpu, hw),
            Verdict::Hold => Decision::Hold,
        }
    }

    /// 读取参考核心的最高频率以及所有在线核心的当前频率
    pub fn sample<H>(tunables: &Tunables, hw: &H) -> Result<LoadSnapshot>
    where
        H: CpuFreq + CpuTopology + ?Sized,
    {
        let max_rate = hw.max_freq(REFERENCE_CPU)?;
        let online = hw.online_cpus()?;

        let mut rates = Vec::with_capacity(online.len() + 1);
        rates.push((REFERENCE_CPU, hw.cur_freq(REFERENCE_CPU)?));
        for cpu in online.iter().copied().filter(|cpu| *cpu != REFERENCE_CPU) {
            rates.push((cpu, hw.cur_freq(cpu)?));
        }

        let mut snapshot = LoadSnapshot::from_rates(
            max_rate,
            tunables.freq_up_pct(),
            tunables.freq_down_pct(),
            &rates,
        )
        .ok_or_else(|| anyhow::anyhow!("Reference cpu{REFERENCE_CPU} missing from sample"))?;
        snapshot.online = online;
        Ok(snapshot)
    }

    /// 升核与降核规则，两者互斥
    pub fn evaluate(state: &ControllerState, tunables: &Tunables, snapshot: &LoadSnapshot) -> Verdict {
        let num_cpus = snapshot.online.len() as u32;

        if snapshot.slow_rate > snapshot.up_rate {
            if num_cpus < tunables.max_cores() && state.cycle_counter >= tunables.cycle_up() {
                return Verdict::Upshift;
            }
        } else if let Some(slow_cpu) = snapshot.slow_cpu {
            if snapshot.fast_rate < snapshot.down_rate
                && num_cpus > tunables.min_cores()
                && state.cycle_counter >= tunables.cycle_down()
            {
                return Verdict::Downshift(slow_cpu);
            }
        }

        Verdict::Hold
    }

    fn upshift<H>(state: &mut ControllerState, snapshot: &LoadSnapshot, hw: &H) -> Decision
    where
        H: CpuTopology + ?Sized,
    {
        let present = match hw.present_cpus() {
            Ok(present) => present,
            Err(e) => {
                warn!("Failed to read present cpus: {e:#}");
                return Decision::Hold;
            }
        };

        let Some(cpu) = present
            .into_iter()
            .find(|cpu| *cpu != REFERENCE_CPU && !snapshot.online.contains(cpu))
        else {
            debug!("No offline cpu left to bring up");
            return Decision::Hold;
        };

        // 命令一经发出即重新计数，失败的核心同样要等待 cycle_up 个周期
        state.cycle_counter = 0;
        match hw.bring_online(cpu) {
            Ok(()) => {
                info!("cpu{cpu} up (online {} -> {})", snapshot.online.len(), snapshot.online.len() + 1);
                Decision::Upshift(cpu)
            }
            Err(e) => {
                warn!("Failed to bring cpu{cpu} online: {e:#}");
                Decision::Hold
            }
        }
    }

    fn downshift<H>(state: &mut ControllerState, cpu: u32, hw: &H) -> Decision
    where
        H: CpuTopology + ?Sized,
    {
        state.cycle_counter = 0;
        match hw.take_offline(cpu) {
            Ok(()) => {
                info!("cpu{cpu} down");
                Decision::Downshift(cpu)
            }
            Err(e) => {
                warn!("Failed to take cpu{cpu} offline: {e:#}");
                Decision::Hold
            }
        }
    }
}
