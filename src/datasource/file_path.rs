// Thread names
pub const MAIN_THREAD: &str = "HotplugMain";
pub const WORKER_THREAD: &str = "HotplugWorker";
pub const CONF_THREAD: &str = "ConfigWatcher";
pub const SCREEN_THREAD: &str = "ScreenStateWatcher";
pub const LOG_LEVEL_THREAD: &str = "LogLevelWatcher";

// CPU 拓扑与频率节点
pub const CPU_SYSFS_ROOT: &str = "/sys/devices/system/cpu";
pub const CPU_ONLINE_LIST: &str = "online";
pub const CPU_PRESENT_LIST: &str = "present";
pub const CPUINFO_MAX_FREQ: &str = "cpufreq/cpuinfo_max_freq";
pub const SCALING_MAX_FREQ: &str = "cpufreq/scaling_max_freq";
pub const SCALING_CUR_FREQ: &str = "cpufreq/scaling_cur_freq";
pub const CPUINFO_CUR_FREQ: &str = "cpufreq/cpuinfo_cur_freq";

// File paths
pub const CONFIG_FILE: &str = "/data/adb/coresmp/config.toml";
pub const SCREEN_STATE_PATH: &str = "/data/adb/coresmp/screen_state";
pub const LOG_PATH: &str = "/data/adb/coresmp/log/coresmp.log";
pub const LOG_LEVEL_PATH: &str = "/data/adb/coresmp/log/log_level";
