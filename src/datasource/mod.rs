pub mod config_parser;
pub mod cpu_topology;
pub mod cpufreq;
pub mod file_path;
pub mod node_monitor;
pub mod screen_monitor;

/// 在临时目录下构建假的 /sys/devices/system/cpu
/// `freqs` 为 (cpu, cpuinfo_max_freq, scaling_cur_freq)
#[cfg(test)]
pub(crate) fn fake_cpu_tree(
    name: &str,
    present: &str,
    online: &str,
    freqs: &[(u32, u64, u64)],
) -> std::path::PathBuf {
    use std::fs;

    use crate::utils::cpulist::parse_cpulist;

    let root = std::env::temp_dir().join(format!("coresmp-sysfs-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("present"), format!("{present}\n")).unwrap();
    fs::write(root.join("online"), format!("{online}\n")).unwrap();

    let online = parse_cpulist(online).unwrap();
    for cpu in parse_cpulist(present).unwrap() {
        let dir = root.join(format!("cpu{cpu}"));
        fs::create_dir_all(&dir).unwrap();
        let state = if online.contains(&cpu) { "1" } else { "0" };
        fs::write(dir.join("online"), state).unwrap();
    }

    for &(cpu, max, cur) in freqs {
        let dir = root.join(format!("cpu{cpu}/cpufreq"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("cpuinfo_max_freq"), format!("{max}\n")).unwrap();
        fs::write(dir.join("scaling_cur_freq"), format!("{cur}\n")).unwrap();
    }

    root
}
