use crate::sample::CpuSample;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cumulative totals for one run.
///
/// CPU time is folded in only after a job's subprocess tree has fully
/// exited. While a job runs, each poll tick overwrites the per-pid entry
/// in its sample table; the table handed to `record_job` is the last
/// observation of every tree member, so summing it attributes the whole
/// tree's CPU time to the run.
#[derive(Debug)]
pub struct RunStats {
    pub completed: usize,
    pub failed: usize,
    pub user_time: Duration,
    pub system_time: Duration,
    started: Instant,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            completed: 0,
            failed: 0,
            user_time: Duration::ZERO,
            system_time: Duration::ZERO,
            started: Instant::now(),
        }
    }

    /// Fold one finished job into the totals.
    pub fn record_job(&mut self, exit_ok: bool, samples: &HashMap<i32, CpuSample>) {
        self.completed += 1;
        if !exit_ok {
            self.failed += 1;
        }
        for sample in samples.values() {
            self.user_time += sample.user;
            self.system_time += sample.system;
        }
    }

    /// Wall-clock time since the run began.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Share of jobs finished, as a truncated integer percentage.
    /// An empty job list reports 0.
    pub fn completed_percent(&self, total_jobs: usize) -> u32 {
        if total_jobs == 0 {
            return 0;
        }
        (self.completed * 100 / total_jobs) as u32
    }

    /// Aggregate CPU usage relative to wall-clock time. Reports 0 when no
    /// wall-clock time has elapsed, rather than dividing by it.
    pub fn cpu_percent(&self, elapsed: Duration) -> f64 {
        let wall = elapsed.as_secs_f64();
        if wall == 0.0 {
            return 0.0;
        }
        (self.user_time + self.system_time).as_secs_f64() / wall * 100.0
    }

    /// The three-line report body: elapsed time, job progress, CPU usage.
    pub fn summary(&self, total_jobs: usize) -> String {
        let elapsed = self.elapsed();
        format!(
            "{} elapsed\n{}/{} ({}%) jobs completed ({} failed)\n{:.0}% cpu ({} user, {} sys)",
            human_duration(elapsed),
            self.completed,
            total_jobs,
            self.completed_percent(total_jobs),
            self.failed,
            self.cpu_percent(elapsed),
            human_duration(self.user_time),
            human_duration(self.system_time),
        )
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Humanized duration, truncated to whole seconds ("2m 5s", "0s").
fn human_duration(d: Duration) -> String {
    humantime::format_duration(Duration::from_secs(d.as_secs())).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(i32, u64, u64)]) -> HashMap<i32, CpuSample> {
        entries
            .iter()
            .map(|&(pid, user, system)| {
                (
                    pid,
                    CpuSample {
                        user: Duration::from_secs(user),
                        system: Duration::from_secs(system),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn record_job_counts_success_and_failure() {
        let mut stats = RunStats::new();
        stats.record_job(true, &HashMap::new());
        stats.record_job(false, &HashMap::new());
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn record_job_sums_every_tree_member() {
        let mut stats = RunStats::new();
        stats.record_job(true, &table(&[(10, 3, 1), (11, 2, 2)]));
        assert_eq!(stats.user_time, Duration::from_secs(5));
        assert_eq!(stats.system_time, Duration::from_secs(3));
    }

    #[test]
    fn fold_order_does_not_change_totals() {
        let a = table(&[(10, 3, 1), (11, 2, 0)]);
        let b = table(&[(20, 7, 4)]);

        let mut first = RunStats::new();
        first.record_job(true, &a);
        first.record_job(false, &b);

        let mut second = RunStats::new();
        second.record_job(false, &b);
        second.record_job(true, &a);

        assert_eq!(first.completed, second.completed);
        assert_eq!(first.failed, second.failed);
        assert_eq!(first.user_time, second.user_time);
        assert_eq!(first.system_time, second.system_time);
    }

    #[test]
    fn empty_sample_table_adds_no_time() {
        let mut stats = RunStats::new();
        stats.record_job(true, &HashMap::new());
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.user_time, Duration::ZERO);
        assert_eq!(stats.system_time, Duration::ZERO);
    }

    #[test]
    fn completed_percent_of_empty_job_list_is_zero() {
        let stats = RunStats::new();
        assert_eq!(stats.completed_percent(0), 0);
    }

    #[test]
    fn completed_percent_truncates() {
        let mut stats = RunStats::new();
        stats.record_job(true, &HashMap::new());
        assert_eq!(stats.completed_percent(3), 33);
    }

    #[test]
    fn cpu_percent_of_zero_elapsed_is_zero() {
        let mut stats = RunStats::new();
        stats.record_job(true, &table(&[(10, 5, 5)]));
        assert_eq!(stats.cpu_percent(Duration::ZERO), 0.0);
    }

    #[test]
    fn cpu_percent_ratio() {
        let mut stats = RunStats::new();
        // 4s of CPU over 8s of wall clock
        stats.record_job(true, &table(&[(10, 3, 1)]));
        assert_eq!(stats.cpu_percent(Duration::from_secs(8)), 50.0);
    }

    #[test]
    fn summary_is_three_lines() {
        let mut stats = RunStats::new();
        stats.record_job(true, &HashMap::new());
        stats.record_job(false, &HashMap::new());
        let summary = stats.summary(4);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("elapsed"));
        assert_eq!(lines[1], "2/4 (50%) jobs completed (1 failed)");
        assert!(lines[2].contains("% cpu ("));
        assert!(lines[2].ends_with(" sys)"));
    }
}
