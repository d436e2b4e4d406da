use std::{
    collections::BTreeSet,
    sync::Mutex,
    thread,
    time::Duration,
};

use anyhow::{Result, bail};

use crate::datasource::{cpu_topology::CpuTopology, cpufreq::CpuFreq};

/// 内存中的假 CPU，记录所有上线/下线命令
pub struct FakeCpu {
    max: u64,
    inner: Mutex<FakeInner>,
}

struct FakeInner {
    rates: Vec<u64>,
    online: BTreeSet<u32>,
    commands: Vec<(&'static str, u32)>,
    failing_freq: BTreeSet<u32>,
    fail_online_list: bool,
    reject_commands: bool,
    sample_delay: Duration,
    samples: usize,
}

impl FakeCpu {
    /// `rates` 的长度即存在的核心数，初始全部在线
    pub fn new(max: u64, rates: &[u64]) -> Self {
        Self {
            max,
            inner: Mutex::new(FakeInner {
                rates: rates.to_vec(),
                online: (0..rates.len() as u32).collect(),
                commands: Vec::new(),
                failing_freq: BTreeSet::new(),
                fail_online_list: false,
                reject_commands: false,
                sample_delay: Duration::ZERO,
                samples: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeInner> {
        self.inner.lock().unwrap()
    }

    pub fn set_online(&self, cpus: &[u32]) {
        self.lock().online = cpus.iter().copied().collect();
    }

    pub fn set_rates(&self, rates: &[u64]) {
        self.lock().rates = rates.to_vec();
    }

    pub fn online(&self) -> Vec<u32> {
        self.lock().online.iter().copied().collect()
    }

    pub fn commands(&self) -> Vec<(&'static str, u32)> {
        self.lock().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.lock().commands.clear();
    }

    pub fn fail_freq_of(&self, cpu: u32) {
        self.lock().failing_freq.insert(cpu);
    }

    /// 读取在线核心列表时返回错误
    pub fn fail_online_list(&self, fail: bool) {
        self.lock().fail_online_list = fail;
    }

    pub fn reject_commands(&self, reject: bool) {
        self.lock().reject_commands = reject;
    }

    /// 每次读取参考核心频率时休眠，用于模拟执行中的周期
    pub fn set_sample_delay(&self, delay: Duration) {
        self.lock().sample_delay = delay;
    }

    /// 已经开始的采样次数
    pub fn samples(&self) -> usize {
        self.lock().samples
    }

    fn command(&self, name: &'static str, cpu: u32, online: bool) -> Result<()> {
        let mut inner = self.lock();
        if inner.reject_commands || cpu as usize >= inner.rates.len() {
            bail!("cpu{cpu} rejected {name}");
        }
        inner.commands.push((name, cpu));
        if online {
            inner.online.insert(cpu);
        } else {
            inner.online.remove(&cpu);
        }
        Ok(())
    }
}

impl CpuFreq for FakeCpu {
    fn max_freq(&self, _cpu: u32) -> Result<u64> {
        Ok(self.max)
    }

    fn cur_freq(&self, cpu: u32) -> Result<u64> {
        let delay = {
            let mut inner = self.lock();
            if cpu == 0 {
                inner.samples += 1;
            }
            inner.sample_delay
        };
        if cpu == 0 && !delay.is_zero() {
            thread::sleep(delay);
        }

        let inner = self.lock();
        if inner.failing_freq.contains(&cpu) {
            bail!("cpu{cpu} has no cpufreq policy");
        }
        match inner.rates.get(cpu as usize) {
            Some(rate) => Ok(*rate),
            None => bail!("cpu{cpu} not present"),
        }
    }
}

impl CpuTopology for FakeCpu {
    fn online_cpus(&self) -> Result<Vec<u32>> {
        if self.lock().fail_online_list {
            bail!("online list unavailable");
        }
        Ok(self.online())
    }

    fn present_cpus(&self) -> Result<Vec<u32>> {
        Ok((0..self.lock().rates.len() as u32).collect())
    }

    fn bring_online(&self, cpu: u32) -> Result<()> {
        self.command("up", cpu, true)
    }

    fn take_offline(&self, cpu: u32) -> Result<()> {
        self.command("down", cpu, false)
    }
}
