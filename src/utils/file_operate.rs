use std::{
    fs::{self, OpenOptions},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::Path,
};

use anyhow::{Context, Result};

pub fn check_read_simple<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists() && path.as_ref().is_file()
}

/// 读取节点内容并去掉首尾空白
pub fn read_node<P: AsRef<Path>>(path: P) -> Result<String> {
    let path_ref = path.as_ref();
    let content = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read from node: {}", path_ref.display()))?;
    Ok(content.trim().to_string())
}

pub fn read_node_u64<P: AsRef<Path>>(path: P) -> Result<u64> {
    let path_ref = path.as_ref();
    let content = read_node(path_ref)?;
    content
        .parse::<u64>()
        .with_context(|| format!("Failed to parse {:?} from {}", content, path_ref.display()))
}

pub fn write_node<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path_ref = path.as_ref();

    // Set permissions to writable
    if path_ref.exists() {
        let metadata = path_ref
            .metadata()
            .with_context(|| format!("Failed to get metadata for: {}", path_ref.display()))?;
        let mut perms = metadata.permissions();
        if perms.mode() & 0o200 == 0 {
            perms.set_mode(0o644);
            fs::set_permissions(path_ref, perms).with_context(|| {
                format!("Failed to set permissions for: {}", path_ref.display())
            })?;
        }
    }

    // 节点必须已存在，不创建新文件
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path_ref)
        .with_context(|| format!("Failed to open node for writing: {}", path_ref.display()))?;

    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to node: {}", path_ref.display()))?;

    Ok(())
}
