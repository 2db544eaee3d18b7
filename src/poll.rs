/// Adaptive sampling loop for one job.
///
/// Every tick snapshots the whole subprocess tree and overwrites the
/// per-pid sample. Counters are monotonic while a process lives, so the
/// last write before it dies is the one worth keeping. The liveness check
/// sits at the top of the loop: a tree that exited during the sleep is
/// never re-sampled, its table is simply final.
///
/// The sleep between ticks is `log10(elapsed_seconds + 1)` seconds, which
/// gives sub-second resolution to short jobs without hammering /proc for
/// jobs that run all night.
use crate::sample::{CpuSample, ProcessTreeSampler};
use crate::signals::InterruptHandler;
use std::collections::HashMap;
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::process::Child;

/// How one job's poll loop ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// The child exited on its own; the sample table is final.
    Exited {
        status: ExitStatus,
        samples: HashMap<i32, CpuSample>,
    },
    /// An interrupt arrived mid-job. The child is still running and
    /// terminating it is the caller's responsibility.
    Interrupted,
}

/// Sleep length for a tick at the given elapsed job time. Never negative,
/// never decreasing.
pub fn poll_interval(elapsed: Duration) -> Duration {
    Duration::from_secs_f64((elapsed.as_secs_f64() + 1.0).log10().max(0.0))
}

pub struct AdaptivePoller<'a, S> {
    sampler: &'a S,
    samples: HashMap<i32, CpuSample>,
}

impl<'a, S: ProcessTreeSampler> AdaptivePoller<'a, S> {
    pub fn new(sampler: &'a S) -> Self {
        Self {
            sampler,
            samples: HashMap::new(),
        }
    }

    /// Sample the child's process tree until the child exits or an
    /// interrupt arrives.
    pub async fn run(
        mut self,
        child: &mut Child,
        interrupts: &mut InterruptHandler,
    ) -> std::io::Result<PollOutcome> {
        let job_start = Instant::now();
        let root = child.id().map(|pid| pid as i32);

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(PollOutcome::Exited {
                    status,
                    samples: self.samples,
                });
            }

            if let Some(root) = root {
                let tree = self.sampler.enumerate_tree(root);
                tracing::debug!(root, members = tree.len(), "sampling job tree");
                for pid in tree {
                    if let Some(cpu) = self.sampler.cpu_time(pid) {
                        self.samples.insert(pid, cpu);
                    }
                }
            }

            let pause = poll_interval(job_start.elapsed());
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = interrupts.recv() => return Ok(PollOutcome::Interrupted),
            }
        }
    }
}
