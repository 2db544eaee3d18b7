/// Process-tree CPU sampling via /proc.
///
/// CPU counters exist only while a process does: once it exits and is
/// reaped there is nothing left to read. The sampler therefore treats a
/// vanished process as an ordinary miss, not an error. Enumeration skips
/// entries that disappear mid-scan, and `cpu_time` answers `None` for a
/// pid that is gone.
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// CPU time attributed to one process at one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuSample {
    pub user: Duration,
    pub system: Duration,
}

/// Capability interface over OS process accounting. The poll loop and the
/// job runner only ever see this trait, so tests can substitute a scripted
/// process table.
pub trait ProcessTreeSampler {
    /// The root pid plus every pid currently descended from it. Members
    /// that exit mid-enumeration are silently omitted.
    fn enumerate_tree(&self, root: i32) -> Vec<i32>;

    /// Instantaneous CPU counters for one pid, or `None` once it is gone.
    fn cpu_time(&self, pid: i32) -> Option<CpuSample>;
}

pub struct ProcfsSampler {
    ticks_per_second: u64,
}

impl ProcfsSampler {
    pub fn new() -> Self {
        Self {
            ticks_per_second: procfs::ticks_per_second(),
        }
    }

    fn ticks_to_duration(&self, ticks: u64) -> Duration {
        Duration::from_secs_f64(ticks as f64 / self.ticks_per_second as f64)
    }
}

impl Default for ProcfsSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTreeSampler for ProcfsSampler {
    fn enumerate_tree(&self, root: i32) -> Vec<i32> {
        let all = match procfs::process::all_processes() {
            Ok(all) => all,
            Err(e) => {
                tracing::debug!(error = %e, "failed to enumerate /proc");
                return vec![root];
            }
        };

        let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
        for proc in all {
            let Ok(proc) = proc else {
                continue; // exited mid-scan
            };
            let Ok(stat) = proc.stat() else {
                continue;
            };
            children.entry(stat.ppid).or_default().push(stat.pid);
        }

        // Breadth-first from the root. The visited set guards against a
        // pid-reuse race producing a cyclic parent edge in the snapshot.
        let mut tree = vec![root];
        let mut seen = HashSet::from([root]);
        let mut index = 0;
        while index < tree.len() {
            if let Some(kids) = children.get(&tree[index]) {
                for &kid in kids {
                    if seen.insert(kid) {
                        tree.push(kid);
                    }
                }
            }
            index += 1;
        }
        tree
    }

    fn cpu_time(&self, pid: i32) -> Option<CpuSample> {
        let proc = procfs::process::Process::new(pid).ok()?;
        let stat = proc.stat().ok()?;
        Some(CpuSample {
            user: self.ticks_to_duration(stat.utime),
            system: self.ticks_to_duration(stat.stime),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn own_pid() -> i32 {
        std::process::id() as i32
    }

    #[test]
    fn test_enumerate_tree_includes_root() {
        let sampler = ProcfsSampler::new();
        let tree = sampler.enumerate_tree(own_pid());
        assert!(tree.contains(&own_pid()));
    }

    #[test]
    fn test_enumerate_tree_sees_spawned_child() {
        let sampler = ProcfsSampler::new();
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let child_pid = child.id() as i32;

        let tree = sampler.enumerate_tree(own_pid());
        assert!(tree.contains(&child_pid));

        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn test_cpu_time_of_live_process() {
        let sampler = ProcfsSampler::new();
        assert!(sampler.cpu_time(own_pid()).is_some());
    }

    #[test]
    fn test_cpu_time_of_reaped_process_is_none() {
        let sampler = ProcfsSampler::new();
        let mut child = Command::new("true").spawn().unwrap();
        let child_pid = child.id() as i32;
        child.wait().unwrap();
        assert_eq!(sampler.cpu_time(child_pid), None);
    }

    #[test]
    fn test_cpu_time_of_bogus_pid_is_none() {
        let sampler = ProcfsSampler::new();
        assert_eq!(sampler.cpu_time(-1), None);
    }

    #[test]
    fn test_tick_conversion() {
        let sampler = ProcfsSampler {
            ticks_per_second: 100,
        };
        assert_eq!(sampler.ticks_to_duration(250), Duration::from_millis(2500));
    }
}
