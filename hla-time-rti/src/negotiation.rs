//! Start-of-execution time negotiation.
//!
//! Before a federation begins advancing, each federate proposes a start time and the
//! federation adopts the maximum of all proposals. Adapted from the federate/RTI start-time
//! handshake pattern, generalized here over any [`LogicalTimeValue`] rather than a single fixed
//! wall-clock timestamp type.

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;

use hla_time_core::LogicalTimeValue;

/// The federate side of start-time negotiation.
#[derive(Debug, Clone)]
pub struct StartTimeProposer<T> {
    proposals: mpsc::Sender<T>,
    negotiated: watch::Receiver<T>,
}

impl<T: LogicalTimeValue> StartTimeProposer<T> {
    /// Propose a start time and wait for the federation to settle on the negotiated maximum.
    pub async fn propose(&mut self, proposal: T) -> Result<T, watch::error::RecvError> {
        let _ = self.proposals.send(proposal).await;
        self.negotiated.changed().await.map(|_| *self.negotiated.borrow())
    }

    pub fn watch(&self) -> watch::Receiver<T> {
        self.negotiated.clone()
    }
}

/// The federation-coordinator side: collects one proposal per federate and broadcasts the max.
pub struct StartTimeNegotiator<T> {
    federate_count: usize,
    proposals: mpsc::Receiver<T>,
    negotiated: watch::Sender<T>,
}

impl<T: LogicalTimeValue> StartTimeNegotiator<T> {
    pub async fn negotiate(self) -> T {
        tracing::debug!(
            "waiting for start time proposals from {} federates",
            self.federate_count
        );

        let proposals = ReceiverStream::new(self.proposals)
            .take(self.federate_count)
            .collect::<Vec<_>>()
            .await;

        let max = proposals
            .into_iter()
            .max()
            .expect("at least one start-time proposal is required");

        let _ = self.negotiated.send(max);
        tracing::debug!(?max, "negotiated start time");
        max
    }
}

/// Build a connected `(StartTimeProposer, StartTimeNegotiator)` pair for `federate_count`
/// federates, seeded with `initial`.
pub fn create<T: LogicalTimeValue>(
    federate_count: usize,
    initial: T,
) -> (StartTimeProposer<T>, StartTimeNegotiator<T>) {
    let (proposals_tx, proposals_rx) = mpsc::channel(1);
    let (negotiated_tx, negotiated_rx) = watch::channel(initial);

    (
        StartTimeProposer {
            proposals: proposals_tx,
            negotiated: negotiated_rx,
        },
        StartTimeNegotiator {
            federate_count,
            proposals: proposals_rx,
            negotiated: negotiated_tx,
        },
    )
}
