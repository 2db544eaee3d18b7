/// One supervised run: launch each job in turn, sample its process tree
/// while it lives, fold the final samples into the run totals, and keep
/// the messaging endpoint updated along the way.
use crate::notify::ProgressReporter;
use crate::poll::{AdaptivePoller, PollOutcome};
use crate::ratelimit::NotifyGate;
use crate::sample::ProcessTreeSampler;
use crate::signals::InterruptHandler;
use crate::stats::RunStats;
use crate::status::RunStatus;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Errors that abort the whole run. The runner reports them as CRASHED
/// rather than letting them escape.
#[derive(Debug)]
pub enum RunError {
    /// The job command could not be launched.
    Spawn { job: String, source: std::io::Error },
    /// Waiting on a launched child failed.
    Wait { source: std::io::Error },
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Spawn { job, source } => {
                write!(f, "failed to launch job '{job}': {source}")
            }
            RunError::Wait { source } => write!(f, "failed waiting on job: {source}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Spawn { source, .. } => Some(source),
            RunError::Wait { source } => Some(source),
        }
    }
}

/// What `main` needs to know once the run is over.
#[derive(Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub stats: RunStats,
}

pub struct JobRunner<S, R> {
    command: Vec<String>,
    jobs: Vec<String>,
    header: Vec<String>,
    sampler: S,
    reporter: R,
    interrupts: InterruptHandler,
    gate: NotifyGate,
    stats: RunStats,
    status: RunStatus,
    shutdown_grace: Duration,
}

impl<S: ProcessTreeSampler, R: ProgressReporter> JobRunner<S, R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        command: Vec<String>,
        jobs: Vec<String>,
        header: Vec<String>,
        sampler: S,
        reporter: R,
        interrupts: InterruptHandler,
        cooldown: Duration,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            command,
            jobs,
            header,
            sampler,
            reporter,
            interrupts,
            gate: NotifyGate::new(cooldown),
            stats: RunStats::new(),
            status: RunStatus::Started,
            shutdown_grace,
        }
    }

    /// Run every job to completion. Infallible: internal errors become a
    /// CRASHED status, and the final report and completion ping go out on
    /// every path.
    pub async fn run(mut self) -> RunOutcome {
        self.reporter.report(self.status, &self.header, "").await;
        self.status = RunStatus::Running;

        if let Err(e) = self.run_jobs().await {
            tracing::error!(error = %e, "run aborted");
            self.status = RunStatus::Crashed;
        }

        if !self.status.is_terminal() {
            self.status = if self.stats.completed == self.jobs.len() && self.stats.failed == 0 {
                RunStatus::Completed
            } else {
                RunStatus::CompletedWithErrors
            };
        }

        // The terminal report and the ping go out whatever happened above.
        let body = self.stats.summary(self.jobs.len());
        self.reporter.report(self.status, &self.header, &body).await;
        self.reporter.ping("").await;

        RunOutcome {
            status: self.status,
            stats: self.stats,
        }
    }

    async fn run_jobs(&mut self) -> Result<(), RunError> {
        for job in self.jobs.clone() {
            let mut child = self.spawn_job(&job)?;
            tracing::info!(pid = ?child.id(), job = %job, "job launched");

            let outcome = AdaptivePoller::new(&self.sampler)
                .run(&mut child, &mut self.interrupts)
                .await
                .map_err(|source| RunError::Wait { source })?;

            match outcome {
                PollOutcome::Exited { status, samples } => {
                    tracing::info!(job = %job, code = ?status.code(), "job finished");
                    self.stats.record_job(status.success(), &samples);

                    if self.gate.allow() {
                        let body = self.stats.summary(self.jobs.len());
                        self.reporter.report(self.status, &self.header, &body).await;
                    }
                }
                PollOutcome::Interrupted => {
                    tracing::warn!(job = %job, "interrupt received, terminating job");
                    self.terminate(&mut child).await;
                    self.status = RunStatus::Interrupted;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn spawn_job(&self, job: &str) -> Result<Child, RunError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(RunError::Spawn {
                job: job.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        Command::new(program)
            .args(args)
            .arg(job)
            .process_group(0) // own group, so an interrupt can stop the whole tree
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                job: job.to_string(),
                source,
            })
    }

    /// Terminate the active job's process group: SIGTERM, a grace period,
    /// then SIGKILL. The child is always reaped so nothing outlives the
    /// supervisor.
    async fn terminate(&self, child: &mut Child) {
        let Some(pid) = child.id() else {
            return; // already reaped
        };
        let group = Pid::from_raw(pid as i32);

        if let Err(e) = killpg(group, Signal::SIGTERM) {
            tracing::debug!(error = %e, pid, "SIGTERM to job group failed");
        }

        match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => tracing::info!(code = ?status.code(), "job terminated"),
            Ok(Err(e)) => tracing::warn!(error = %e, "failed waiting on terminated job"),
            Err(_) => {
                tracing::warn!(pid, "job ignored SIGTERM, killing process group");
                let _ = killpg(group, Signal::SIGKILL);
                if let Err(e) = child.wait().await {
                    tracing::warn!(error = %e, "failed reaping killed job");
                }
            }
        }
    }
}
