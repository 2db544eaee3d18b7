/// Interrupt handling for a supervised run.
///
/// SIGINT (Ctrl-C) and SIGTERM both cancel the run: the runner terminates
/// the active job's process group, reports INTERRUPTED, and exits cleanly.
/// Reception is exposed as a future so the poll loop can race it against
/// its sample-interval sleep.
use tokio::signal::unix::{signal, Signal, SignalKind};
#[cfg(test)]
use tokio::sync::mpsc;

pub struct InterruptHandler {
    source: Source,
}

enum Source {
    /// Live process signals.
    Signals { sigint: Signal, sigterm: Signal },
    /// Test-driven interrupts: one message behaves like one signal.
    #[cfg(test)]
    Channel(mpsc::UnboundedReceiver<()>),
    /// Never fires.
    #[cfg(test)]
    Disabled,
}

impl InterruptHandler {
    /// Install handlers for SIGINT and SIGTERM.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            source: Source::Signals {
                sigint: signal(SignalKind::interrupt())?,
                sigterm: signal(SignalKind::terminate())?,
            },
        })
    }

    /// A handler that never reports an interrupt.
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self {
            source: Source::Disabled,
        }
    }

    /// A channel-driven handler for tests.
    #[cfg(test)]
    pub fn channel() -> (Self, mpsc::UnboundedSender<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                source: Source::Channel(rx),
            },
            tx,
        )
    }

    /// Resolves when an interrupt arrives. Cancel-safe, so it can sit in a
    /// `select!` arm. Pends forever for a disabled handler or a channel
    /// whose sender was dropped.
    pub async fn recv(&mut self) {
        match &mut self.source {
            Source::Signals { sigint, sigterm } => {
                tokio::select! {
                    _ = sigint.recv() => tracing::info!("received SIGINT"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                }
            }
            #[cfg(test)]
            Source::Channel(rx) => {
                if rx.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
            #[cfg(test)]
            Source::Disabled => std::future::pending().await,
        }
    }
}
