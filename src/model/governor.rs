use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::{
    datasource::{cpu_topology::CpuTopology, cpufreq::CpuFreq},
    model::{
        cycle_worker::CycleWorker,
        decision_engine::{ControllerState, DecisionEngine},
        tunables::Tunables,
    },
    utils::constants::hotplug::{REFERENCE_CPU, STARTUP_DELAY_MS},
};

/// 亮灭屏通知
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerEvent {
    Suspend,
    Resume,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerState {
    Active,
    Suspended,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Active => f.write_str("active"),
            PowerState::Suspended => f.write_str("suspended"),
        }
    }
}

struct Core {
    enabled: bool,
    state: Option<ControllerState>,
    power: PowerState,
}

struct Shared<H> {
    hw: H,
    tunables: Mutex<Tunables>,
    /// 周期与亮灭屏切换对拓扑的操作都在这把锁内完成
    core: Mutex<Core>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<H> Shared<H>
where
    H: CpuFreq + CpuTopology,
{
    fn tunables(&self) -> Tunables {
        *lock(&self.tunables)
    }

    // 工作线程每次到期调用，返回下一次的延迟
    fn tick(&self) -> Option<Duration> {
        let mut core = lock(&self.core);
        if !core.enabled || core.power == PowerState::Suspended {
            return None;
        }

        let tunables = self.tunables();
        let state = core.state.as_mut()?;
        DecisionEngine::run_cycle(state, &tunables, &self.hw);

        Some(Duration::from_millis(u64::from(tunables.delay_ms())))
    }

    // 拓扑读取失败时放弃本次操作，不在空集合上继续
    fn topology(&self) -> Result<(Vec<u32>, Vec<u32>)> {
        let present = self.hw.present_cpus()?;
        let online = self.hw.online_cpus()?;
        Ok((present, online))
    }

    // 除参考核心外的在线核心全部下线
    fn collapse_to_reference(&self) {
        let (present, online) = match self.topology() {
            Ok(topology) => topology,
            Err(e) => {
                warn!("Skipping collapse to cpu{REFERENCE_CPU}: {e:#}");
                return;
            }
        };

        for cpu in present {
            if cpu == REFERENCE_CPU || !online.contains(&cpu) {
                continue;
            }
            if let Err(e) = self.hw.take_offline(cpu) {
                warn!("Failed to take cpu{cpu} offline: {e:#}");
            }
        }
    }

    // 按编号升序上线，直到全部在线或达到 limit
    fn restore_cores(&self, limit: Option<u32>) {
        let (present, online) = match self.topology() {
            Ok(topology) => topology,
            Err(e) => {
                warn!("Skipping core restore: {e:#}");
                return;
            }
        };
        let mut num_cpus = online.len() as u32;

        for cpu in present {
            if limit.is_some_and(|max| num_cpus >= max) {
                break;
            }
            if cpu == REFERENCE_CPU || online.contains(&cpu) {
                continue;
            }
            match self.hw.bring_online(cpu) {
                Ok(()) => num_cpus += 1,
                Err(e) => warn!("Failed to bring cpu{cpu} online: {e:#}"),
            }
        }
    }
}

/// 热插拔控制器
/// 持有可调参数与运行期状态，负责启停、亮灭屏切换以及周期调度
pub struct Governor<H> {
    shared: Arc<Shared<H>>,
    /// 启停与亮灭屏切换互斥执行，同时持有当前的工作线程
    transition: Mutex<Option<CycleWorker>>,
    startup_delay: Duration,
    #[cfg(test)]
    fail_spawn: std::sync::atomic::AtomicBool,
}

impl<H> Governor<H>
where
    H: CpuFreq + CpuTopology + 'static,
{
    pub fn new(hw: H, tunables: Tunables) -> Self {
        Self {
            shared: Arc::new(Shared {
                hw,
                tunables: Mutex::new(tunables),
                core: Mutex::new(Core {
                    enabled: false,
                    state: None,
                    power: PowerState::Active,
                }),
            }),
            transition: Mutex::new(None),
            startup_delay: Duration::from_millis(STARTUP_DELAY_MS),
            #[cfg(test)]
            fail_spawn: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn hw(&self) -> &H {
        &self.shared.hw
    }

    pub fn enabled(&self) -> bool {
        lock(&self.shared.core).enabled
    }

    pub fn power_state(&self) -> PowerState {
        lock(&self.shared.core).power
    }

    /// 控制器停止时为 None
    pub fn cycle_counter(&self) -> Option<u32> {
        lock(&self.shared.core)
            .state
            .as_ref()
            .map(|state| state.cycle_counter)
    }

    pub fn tunables(&self) -> Tunables {
        self.shared.tunables()
    }

    /// 在副本上修改参数，全部成功后才提交
    pub fn update_tunables<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Tunables) -> Result<()>,
    {
        let mut tunables = lock(&self.shared.tunables);
        let mut next = *tunables;
        f(&mut next)?;
        *tunables = next;
        Ok(())
    }

    /// 写入 enabled，变化时启动或停止控制器
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        let mut worker = lock(&self.transition);
        if self.enabled() == enabled {
            debug!("Hotplug already {}", if enabled { "enabled" } else { "disabled" });
            return Ok(());
        }

        if enabled {
            self.start(&mut worker)
        } else {
            self.stop(&mut worker);
            Ok(())
        }
    }

    fn start(&self, worker: &mut Option<CycleWorker>) -> Result<()> {
        {
            let mut core = lock(&self.shared.core);
            core.enabled = true;
            core.state = Some(ControllerState::new());
            core.power = PowerState::Active;
        }

        match self.spawn_worker(self.startup_delay) {
            Ok(w) => {
                *worker = Some(w);
                info!("Hotplug started, first cycle in {}ms", self.startup_delay.as_millis());
                Ok(())
            }
            Err(e) => {
                let mut core = lock(&self.shared.core);
                core.enabled = false;
                core.state = None;
                error!("Unable to start hotplug: {e:#}");
                Err(e)
            }
        }
    }

    fn stop(&self, worker: &mut Option<CycleWorker>) {
        if let Some(mut w) = worker.take() {
            w.cancel_and_wait();
        }

        let mut core = lock(&self.shared.core);
        core.enabled = false;
        core.state = None;
        core.power = PowerState::Active;
        self.shared.restore_cores(None);
        info!("Hotplug stopped, all cores restored");
    }

    fn spawn_worker(&self, delay: Duration) -> Result<CycleWorker> {
        #[cfg(test)]
        if self.fail_spawn.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("Worker thread unavailable");
        }

        let shared = Arc::clone(&self.shared);
        CycleWorker::spawn(delay, move || shared.tick())
    }

    /// 亮灭屏通知入口，控制器未启用时忽略
    pub fn notify(&self, event: PowerEvent) {
        let mut worker = lock(&self.transition);
        let power = {
            let core = lock(&self.shared.core);
            if !core.enabled {
                debug!("Ignoring {event:?}, hotplug disabled");
                return;
            }
            core.power
        };

        match (event, power) {
            (PowerEvent::Suspend, PowerState::Active) => self.suspend(&mut worker),
            (PowerEvent::Resume, PowerState::Suspended) => self.resume(&mut worker),
            _ => debug!("Ignoring {event:?}, already {power}"),
        }
    }

    fn suspend(&self, worker: &mut Option<CycleWorker>) {
        // 先等待正在执行的周期结束，再强制下线
        if let Some(mut w) = worker.take() {
            w.cancel_and_wait();
        }

        let tunables = self.tunables();
        let mut core = lock(&self.shared.core);
        if tunables.single_core_on_screen_off() {
            self.shared.collapse_to_reference();
        }
        core.power = PowerState::Suspended;
        info!("Hotplug suspended");
    }

    fn resume(&self, worker: &mut Option<CycleWorker>) {
        let tunables = self.tunables();
        {
            let mut core = lock(&self.shared.core);
            if tunables.single_core_on_screen_off() {
                self.shared.restore_cores(Some(tunables.max_cores()));
            }
            core.power = PowerState::Active;
        }

        let delay = Duration::from_millis(u64::from(tunables.delay_ms()));
        match self.spawn_worker(delay) {
            Ok(w) => {
                *worker = Some(w);
                info!("Hotplug resumed");
            }
            Err(e) => error!("Unable to resume hotplug cycle: {e:#}"),
        }
    }

    /// 立即执行一个周期（不重新调度），控制器未运行或已挂起时返回 None
    #[cfg(test)]
    pub fn run_cycle_now(&self) -> Option<crate::model::decision_engine::Decision> {
        let mut core = lock(&self.shared.core);
        if core.power == PowerState::Suspended {
            return None;
        }
        let tunables = self.shared.tunables();
        let state = core.state.as_mut()?;
        Some(DecisionEngine::run_cycle(state, &tunables, &self.shared.hw))
    }
}
