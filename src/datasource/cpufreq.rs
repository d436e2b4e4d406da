use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use crate::{
    datasource::file_path::*,
    utils::file_operate::read_node_u64,
};

/// 每个核心的频率查询（单位 KHz）
pub trait CpuFreq: Send + Sync {
    /// 核心可达到的最高频率
    fn max_freq(&self, cpu: u32) -> Result<u64>;
    /// 核心当前运行频率
    fn cur_freq(&self, cpu: u32) -> Result<u64>;
}

/// 基于 /sys/devices/system/cpu 的实现
#[derive(Clone, Debug)]
pub struct SysfsCpu {
    root: PathBuf,
}

impl SysfsCpu {
    pub fn new() -> Self {
        Self::with_root(CPU_SYSFS_ROOT)
    }

    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn cpu_node(&self, cpu: u32, node: &str) -> PathBuf {
        self.root.join(format!("cpu{cpu}")).join(node)
    }

    // 依次尝试多个节点，返回第一个可读取的值
    fn read_first(&self, cpu: u32, nodes: &[&str]) -> Result<u64> {
        let mut last_err = None;
        for node in nodes {
            match read_node_u64(self.cpu_node(cpu, node)) {
                Ok(freq) => return Ok(freq),
                Err(e) => {
                    debug!("cpu{cpu}: {node} unavailable: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("No frequency node for cpu{cpu}")))
            .with_context(|| format!("Failed to read frequency of cpu{cpu}"))
    }
}

impl Default for SysfsCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuFreq for SysfsCpu {
    fn max_freq(&self, cpu: u32) -> Result<u64> {
        self.read_first(cpu, &[CPUINFO_MAX_FREQ, SCALING_MAX_FREQ])
    }

    fn cur_freq(&self, cpu: u32) -> Result<u64> {
        self.read_first(cpu, &[SCALING_CUR_FREQ, CPUINFO_CUR_FREQ])
    }
}
