//! TelemetryActor - single owner of the telemetry dataset
//!
//! All access to the dataset is serialized through one command queue. There
//! is no lock: the total order of the queue is the only synchronization.

use super::actor_handle::TelemetryHandle;
use super::commands::TelemetryCommand;
use super::types::{apply_write, changed_entries, Dataset, ReadReply, Record};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Actor that owns the dataset and answers writes and reads in arrival order
///
/// ```text
/// supervisor ──Write──┐
///                     ▼
///            command_rx (UnboundedReceiver) ──► dataset: HashMap<String, String>
///                     ▲
/// consumers ──Read────┘  ◄── oneshot ReadReply
/// ```
pub struct TelemetryActor {
    /// The canonical dataset
    dataset: Dataset,

    /// Receiver for incoming commands
    command_rx: mpsc::UnboundedReceiver<TelemetryCommand>,

    /// Number of write batches applied
    writes_applied: u64,

    /// Number of read requests answered
    reads_served: u64,
}

impl TelemetryActor {
    /// Spawn a new TelemetryActor and return a handle for interacting with it
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn() -> TelemetryHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let actor = TelemetryActor {
            dataset: Dataset::new(),
            command_rx: cmd_rx,
            writes_applied: 0,
            reads_served: 0,
        };

        tokio::spawn(actor.run());

        info!("TelemetryActor spawned");

        TelemetryHandle::new(cmd_tx)
    }

    /// Main run loop
    ///
    /// Runs until a `Shutdown` command arrives or every handle is dropped.
    async fn run(mut self) {
        debug!("TelemetryActor run loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing command");

            match cmd {
                TelemetryCommand::Write { data } => {
                    self.handle_write(data);
                }
                TelemetryCommand::Read { interest, response } => {
                    let reply = self.handle_read(interest);
                    let _ = response.send(reply);
                }
                TelemetryCommand::Snapshot { response } => {
                    let _ = response.send(self.dataset.clone());
                }
                TelemetryCommand::Shutdown => {
                    info!("TelemetryActor received shutdown command");
                    break;
                }
            }
        }

        // Answer reads that were queued behind the shutdown so their callers
        // get their caches back.
        self.command_rx.close();
        while let Ok(cmd) = self.command_rx.try_recv() {
            if let TelemetryCommand::Read { interest, response } = cmd {
                let _ = response.send(self.handle_read(interest));
            }
        }

        info!(
            writes_applied = self.writes_applied,
            reads_served = self.reads_served,
            keys = self.dataset.len(),
            "TelemetryActor run loop terminated"
        );
    }

    fn handle_write(&mut self, data: Record) {
        trace!(keys = data.len(), "Dataset write");
        apply_write(&mut self.dataset, data);
        self.writes_applied += 1;
    }

    fn handle_read(&mut self, interest: Record) -> ReadReply {
        self.reads_served += 1;
        ReadReply {
            updates: changed_entries(&self.dataset, &interest),
        }
    }
}
