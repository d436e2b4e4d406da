mod datasource;
mod model;
mod utils;

use std::{env, path::Path, sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::{
    datasource::{
        config_parser::{HotplugConfig, config_read},
        cpu_topology::CpuTopology,
        cpufreq::SysfsCpu,
        file_path::*,
        node_monitor::{apply_config, monitor_config},
        screen_monitor::monitor_screen_state,
    },
    model::{
        decision_engine::DecisionEngine,
        governor::Governor,
        tunables::{Tunable, Tunables},
    },
    utils::{
        constants::{AUTHOR, NOTES, VERSION},
        cpulist::format_cpulist,
        log_monitor::monitor_log_level,
        logger::init_logger,
    },
};

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

fn print_banner() {
    println!("{}", NOTES);
    println!("{}", AUTHOR);
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "-h" => {
                print_banner();
                println!("Usage:");
                println!("\t-v show version");
                println!("\t-d dump tunables and current cpu load");
                println!("\t-h show help");
                println!("\t<tunable>=<value> override a tunable at startup");
                return Ok(());
            }
            "-v" => {
                print_banner();
                println!("{}", VERSION);
                return Ok(());
            }
            "-d" => return dump_status(),
            arg if !arg.contains('=') => {
                println!("Unknown argument: {}", arg);
                println!("Use -h for help");
                return Ok(());
            }
            _ => {}
        }
    }

    init_logger()?;

    info!("{}", NOTES);
    info!("{}", AUTHOR);
    info!("{}", VERSION);

    let hw = SysfsCpu::new();
    let present = hw.present_cpus().with_context(|| "Can't read cpu topology")?;
    info!("Present cpus: {}", format_cpulist(&present));
    match hw.online_cpus() {
        Ok(online) => info!("Online cpus: {}", format_cpulist(&online)),
        Err(e) => warn!("Failed to read online cpus: {e:#}"),
    }

    let config = load_config();
    let tunables = Tunables::new(present.len() as u32);
    let governor = Arc::new(Governor::new(hw, tunables).with_startup_delay(config.startup_delay()));

    governor.update_tunables(|tunables| apply_overrides(tunables, &args[1..]))?;
    if let Err(e) = apply_config(&governor, &config) {
        error!("Failed to apply config: {e:#}");
        return Err(e);
    }
    log_tunables(&governor.tunables());

    let gov_conf = Arc::clone(&governor);
    thread::Builder::new()
        .name(CONF_THREAD.to_string())
        .spawn(move || {
            if let Err(e) = monitor_config(gov_conf, CONFIG_FILE) {
                error!("Config monitor error: {}", e);
            }
        })
        .with_context(|| format!("Failed to spawn {CONF_THREAD}"))?;

    let gov_screen = Arc::clone(&governor);
    let state_node = config.power.state_node().to_string();
    thread::Builder::new()
        .name(SCREEN_THREAD.to_string())
        .spawn(move || {
            if let Err(e) = monitor_screen_state(gov_screen, &state_node) {
                error!("Screen state monitor error: {}", e);
            }
        })
        .with_context(|| format!("Failed to spawn {SCREEN_THREAD}"))?;

    thread::Builder::new()
        .name(LOG_LEVEL_THREAD.to_string())
        .spawn(move || {
            if let Err(e) = monitor_log_level() {
                error!("Log level monitor error: {}", e);
            }
        })
        .with_context(|| format!("Failed to spawn {LOG_LEVEL_THREAD}"))?;

    info!("{} Start", MAIN_THREAD);
    info!("Hotplug Governor Started");

    loop {
        thread::sleep(STATUS_INTERVAL);
        match governor.hw().online_cpus() {
            Ok(online) => debug!(
                "Status: enabled={}, power={}, cycle={:?}, online={}",
                governor.enabled(),
                governor.power_state(),
                governor.cycle_counter(),
                format_cpulist(&online)
            ),
            Err(e) => debug!("Status: failed to read online cpus: {e:#}"),
        }
    }
}

// 配置文件缺失或无法解析时使用默认值，控制器保持关闭
fn load_config() -> HotplugConfig {
    if !Path::new(CONFIG_FILE).exists() {
        warn!("Config file not found: {}, using defaults (disabled)", CONFIG_FILE);
        return HotplugConfig::default();
    }

    info!("Reading config file: {}", CONFIG_FILE);
    match config_read(CONFIG_FILE) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to read config file: {e:#}, using defaults (disabled)");
            HotplugConfig::default()
        }
    }
}

/// 命令行覆盖参数，格式为 name=value
fn apply_overrides(tunables: &mut Tunables, overrides: &[String]) -> Result<()> {
    for arg in overrides {
        let (name, value) = arg
            .split_once('=')
            .with_context(|| format!("Invalid override: {arg}"))?;
        let tunable: Tunable = name.trim().parse()?;
        tunables.store(tunable, value)?;
        info!("Override {} = {}", tunable, tunables.show(tunable));
    }
    Ok(())
}

fn log_tunables(tunables: &Tunables) {
    info!("Tunables (nr_cpus={}):", tunables.nr_cpus());
    for tunable in Tunable::ALL {
        info!("  {}: {}", tunable, tunables.show(tunable));
    }
}

fn dump_status() -> Result<()> {
    let hw = SysfsCpu::new();
    let present = hw.present_cpus()?;
    let online = hw.online_cpus()?;

    let mut tunables = Tunables::new(present.len() as u32);
    if Path::new(CONFIG_FILE).exists() {
        let config = config_read(CONFIG_FILE)?;
        config.tunables.apply(&mut tunables);
        println!("enabled: {}", u8::from(config.enabled));
    }
    for tunable in Tunable::ALL {
        println!("{}: {}", tunable, tunables.show(tunable));
    }

    println!("present: {}", format_cpulist(&present));
    println!("online: {}", format_cpulist(&online));

    let snapshot = DecisionEngine::sample(&tunables, &hw)?;
    println!(
        "rates: ref={} slow={} ({}) fast={} up={} down={}",
        snapshot.reference_rate,
        snapshot.slow_rate,
        snapshot
            .slow_cpu
            .map_or_else(|| "-".to_string(), |cpu| format!("cpu{cpu}")),
        snapshot.fast_rate,
        snapshot.up_rate,
        snapshot.down_rate
    );

    Ok(())
}
