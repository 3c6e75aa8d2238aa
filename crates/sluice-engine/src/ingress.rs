//! External command ingress.
//!
//! A bounded channel carries commands from outside threads into the
//! scheduler, which drains it at the start of every step. Commands
//! arriving mid-step take effect at the next step boundary; the step in
//! progress always runs to completion.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use sluice_bus::Topic;
use sluice_core::Payload;

/// Default ingress capacity. A full queue rejects rather than blocks.
const INGRESS_CAPACITY: usize = 1024;

/// A command submitted from outside the simulation thread.
#[derive(Clone, Debug)]
pub enum ExternalCommand {
    /// Publish a payload on the bus, delivered in the next step's
    /// dispatch rounds like any agent-published message.
    Publish {
        /// Destination topic.
        topic: Topic,
        /// Message payload.
        payload: Payload,
    },
    /// Stop the run at the next step boundary. The in-progress step
    /// completes and is recorded.
    Stop,
}

/// Cloneable submission handle for a scheduler's ingress queue.
#[derive(Clone, Debug)]
pub struct IngressHandle {
    tx: Sender<ExternalCommand>,
}

impl IngressHandle {
    /// Submit a publish command.
    ///
    /// Returns `false` if the queue is full or the scheduler is gone;
    /// the command is dropped in either case.
    pub fn publish(&self, topic: Topic, payload: Payload) -> bool {
        self.submit(ExternalCommand::Publish { topic, payload })
    }

    /// Request an orderly stop at the next step boundary.
    pub fn stop(&self) -> bool {
        self.submit(ExternalCommand::Stop)
    }

    fn submit(&self, command: ExternalCommand) -> bool {
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Build the handle/receiver pair for one scheduler.
pub(crate) fn ingress_channel() -> (IngressHandle, Receiver<ExternalCommand>) {
    let (tx, rx) = bounded(INGRESS_CAPACITY);
    (IngressHandle { tx }, rx)
}
