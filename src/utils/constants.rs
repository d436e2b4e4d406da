/// Hotplug Governor 常量定义
pub const NOTES: &str = "Load-Based CPU Core Hotplug Governor";
pub const AUTHOR: &str = "Author: Seyud @GitHub, Tools-cx-app @GitHub";
pub const VERSION: &str = "Version: v1.2.0";

/// 调度相关常量
pub mod hotplug {
    /// 启动后第一次采样前的等待时间，避免开机阶段频繁上下线
    pub const STARTUP_DELAY_MS: u64 = 30000;
    /// 参考核心，不参与下线选择
    pub const REFERENCE_CPU: u32 = 0;
    /// 工作线程期望的 nice 值
    pub const WORKER_NICE: i32 = -10;
}

/// 可调参数的默认值与边界
pub mod tunable {
    pub const DEFAULT_DELAY_MS: u32 = 50;
    pub const DEFAULT_SCROFF_SINGLE_CORE: bool = true;
    pub const DEFAULT_MIN_CPUS: u32 = 2;
    pub const DEFAULT_CPUFREQ_UP: u32 = 60;
    pub const DEFAULT_CPUFREQ_DOWN: u32 = 40;
    pub const DEFAULT_CYCLE_UP: u32 = 2;
    pub const DEFAULT_CYCLE_DOWN: u32 = 2;

    pub const DELAY_RANGE: (u32, u32) = (10, 10000);
    pub const PERCENT_RANGE: (u32, u32) = (1, 100);
    pub const CYCLE_RANGE: (u32, u32) = (1, 6);
}
