use anyhow::{Context, Result};
use log::debug;

use crate::{
    datasource::{cpufreq::SysfsCpu, file_path::*},
    utils::{
        cpulist::parse_cpulist,
        file_operate::{read_node, write_node},
    },
};

/// 核心拓扑访问：枚举在线/存在的核心，执行上线与下线
pub trait CpuTopology: Send + Sync {
    /// 当前在线核心，升序
    fn online_cpus(&self) -> Result<Vec<u32>>;
    /// 物理存在的核心，升序
    fn present_cpus(&self) -> Result<Vec<u32>>;
    fn bring_online(&self, cpu: u32) -> Result<()>;
    fn take_offline(&self, cpu: u32) -> Result<()>;
}

impl SysfsCpu {
    fn read_cpulist(&self, node: &str) -> Result<Vec<u32>> {
        let path = self.root().join(node);
        let content = read_node(&path)?;
        parse_cpulist(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn write_online(&self, cpu: u32, online: bool) -> Result<()> {
        let path = self.cpu_node(cpu, "online");
        debug!("write {} to {}", u8::from(online), path.display());
        write_node(&path, if online { "1" } else { "0" })
            .with_context(|| format!("Failed to set cpu{cpu} online={online}"))
    }
}

impl CpuTopology for SysfsCpu {
    fn online_cpus(&self) -> Result<Vec<u32>> {
        self.read_cpulist(CPU_ONLINE_LIST)
    }

    fn present_cpus(&self) -> Result<Vec<u32>> {
        self.read_cpulist(CPU_PRESENT_LIST)
    }

    fn bring_online(&self, cpu: u32) -> Result<()> {
        self.write_online(cpu, true)
    }

    fn take_offline(&self, cpu: u32) -> Result<()> {
        self.write_online(cpu, false)
    }
}
