mod config;
mod notify;
mod poll;
mod ratelimit;
mod runner;
mod sample;
mod signals;
mod stats;
mod status;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::notify::slack::SlackReporter;
use crate::runner::JobRunner;
use crate::sample::ProcfsSampler;
use crate::signals::InterruptHandler;
use crate::status::RunStatus;

/// Runs a command once per job argument, in sequence, under supervision.
/// While each job runs its whole process tree is CPU-sampled, and a Slack
/// message is kept up to date with progress so nobody has to babysit a
/// terminal. Needs SLACK_BOT_TOKEN and SLACK_USER_ID in the environment.
#[derive(Parser, Debug)]
#[command(name = "drover", version, about)]
struct Cli {
    /// Command to run, tokenized on whitespace (e.g. "make -C build")
    command: String,

    /// Job arguments; the command runs once per argument, with it appended
    #[arg(value_name = "JOB")]
    jobs: Vec<String>,

    /// Config file path
    #[arg(short, long, default_value = "drover.toml")]
    config: PathBuf,

    /// Slack channel to post to (overrides config)
    #[arg(long)]
    channel: Option<String>,

    /// Seconds between in-progress updates (overrides config)
    #[arg(long)]
    cooldown: Option<u64>,

    /// Print the resolved plan and exit without launching anything
    #[arg(long)]
    dry_run: bool,

    /// Extra logging, including per-tick sampling detail
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_directive = if cli.verbose {
        "drover=debug"
    } else if cli.quiet {
        "drover=warn"
    } else {
        "drover=info"
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.parse().unwrap()),
        )
        .init();

    let command: Vec<String> = cli.command.split_whitespace().map(str::to_string).collect();
    if command.is_empty() {
        tracing::error!("command must contain at least one token");
        return ExitCode::FAILURE;
    }

    let config = match config::load(&cli.config) {
        Ok(mut config) => {
            if let Some(channel) = cli.channel {
                config.slack.channel = channel;
            }
            if let Some(cooldown) = cli.cooldown {
                config.notify.cooldown_secs = cooldown;
            }
            config
        }
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            return ExitCode::FAILURE;
        }
    };

    if cli.dry_run {
        println!("drover v{}", env!("CARGO_PKG_VERSION"));
        println!("Command: {}", command.join(" "));
        println!("Jobs ({}):", cli.jobs.len());
        for job in &cli.jobs {
            println!("  {job}");
        }
        println!("Channel: #{}", config.slack.channel);
        println!("Notify cooldown: {}s", config.notify.cooldown_secs);
        println!("Dry run, nothing launched.");
        return ExitCode::SUCCESS;
    }

    let token = match std::env::var("SLACK_BOT_TOKEN") {
        Ok(token) => token,
        Err(_) => {
            tracing::error!("SLACK_BOT_TOKEN is not set");
            return ExitCode::FAILURE;
        }
    };
    let user_id = match std::env::var("SLACK_USER_ID") {
        Ok(id) => id,
        Err(_) => {
            tracing::error!("SLACK_USER_ID is not set");
            return ExitCode::FAILURE;
        }
    };

    let interrupts = match InterruptHandler::install() {
        Ok(handler) => handler,
        Err(e) => {
            tracing::error!(error = %e, "failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    let identity = identity_line();
    let header = vec![identity.clone(), format!("`{}`", command.join(" "))];

    tracing::info!(
        command = %command.join(" "),
        jobs = cli.jobs.len(),
        channel = %config.slack.channel,
        "drover starting"
    );

    let reporter = SlackReporter::connect(token, user_id, &config.slack.channel, &identity).await;

    let runner = JobRunner::new(
        command,
        cli.jobs,
        header,
        ProcfsSampler::new(),
        reporter,
        interrupts,
        Duration::from_secs(config.notify.cooldown_secs),
        Duration::from_secs(config.shutdown.grace_secs),
    );

    let outcome = runner.run().await;
    tracing::info!(
        status = %outcome.status,
        completed = outcome.stats.completed,
        failed = outcome.stats.failed,
        "run finished"
    );

    if outcome.status == RunStatus::Crashed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// `user@host:` identity line for the report header. A side that cannot
/// be resolved degrades to "unknown" rather than failing the run.
fn identity_line() -> String {
    format!(
        "{}@{}:",
        whoami::username().unwrap_or_else(|_| "unknown".to_string()),
        whoami::hostname().unwrap_or_else(|_| "unknown".to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_line_shape() {
        let identity = identity_line();
        assert!(identity.contains('@'));
        assert!(identity.ends_with(':'));
    }
}
