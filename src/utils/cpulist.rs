use anyhow::{Context, Result, anyhow};

/// 解析内核 cpulist 格式，例如 `0-3,5,7-8`
/// 返回升序且去重的 CPU 编号
pub fn parse_cpulist(content: &str) -> Result<Vec<u32>> {
    let mut cpus = Vec::new();

    for part in content.trim().split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        match part.split_once('-') {
            Some((start, end)) => {
                let start = start
                    .trim()
                    .parse::<u32>()
                    .with_context(|| format!("Invalid cpulist range start: {part}"))?;
                let end = end
                    .trim()
                    .parse::<u32>()
                    .with_context(|| format!("Invalid cpulist range end: {part}"))?;
                if start > end {
                    return Err(anyhow!("Invalid cpulist range: {part}"));
                }
                cpus.extend(start..=end);
            }
            None => {
                let cpu = part
                    .parse::<u32>()
                    .with_context(|| format!("Invalid cpulist entry: {part}"))?;
                cpus.push(cpu);
            }
        }
    }

    cpus.sort_unstable();
    cpus.dedup();
    Ok(cpus)
}

/// 将 CPU 编号列表格式化为 cpulist，连续编号合并为区间
pub fn format_cpulist(cpus: &[u32]) -> String {
    let mut sorted = cpus.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }

    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ranges_and_singles() {
        assert_eq!(parse_cpulist("0-3,5,7-8\n").unwrap(), vec![0, 1, 2, 3, 5, 7, 8]);
    }

    #[test]
    fn parses_single_cpu() {
        assert_eq!(parse_cpulist("0").unwrap(), vec![0]);
    }

    #[test]
    fn empty_list_is_no_cpus() {
        assert!(parse_cpulist("\n").unwrap().is_empty());
    }

    #[test]
    fn overlapping_entries_are_deduplicated() {
        assert_eq!(parse_cpulist("2,0-2,1").unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_cpulist("0-a").is_err());
        assert!(parse_cpulist("3-1").is_err());
        assert!(parse_cpulist("x").is_err());
    }

    #[test]
    fn formats_back_into_ranges() {
        assert_eq!(format_cpulist(&[0, 1, 2, 3, 5, 7, 8]), "0-3,5,7-8");
        assert_eq!(format_cpulist(&[4]), "4");
        assert_eq!(format_cpulist(&[]), "");
    }
}
