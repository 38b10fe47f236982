//! Receiving end of a run

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::step::Step;

/// Handle to a spawned run: a stream of steps plus a cancel switch.
///
/// The step channel closes after the terminal step. Dropping the handle
/// stops the run at its next emission.
#[derive(Debug)]
pub struct RunHandle {
    id: Uuid,
    steps: mpsc::Receiver<Step>,
    cancel: CancellationToken,
}

impl RunHandle {
    pub(crate) fn new(id: Uuid, steps: mpsc::Receiver<Step>, cancel: CancellationToken) -> Self {
        Self { id, steps, cancel }
    }

    /// Identifier carried by the run's tracing span
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next step, or `None` once the run has finished
    pub async fn recv(&mut self) -> Option<Step> {
        self.steps.recv().await
    }

    /// Ask the run to stop. The run emits a "Task cancelled" error step at
    /// its next checkpoint, including while a model call is in flight.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this run, for callers that outlive the handle
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Consume the handle as a `Stream` of steps
    pub fn into_stream(self) -> impl Stream<Item = Step> + Send + 'static {
        futures::stream::unfold(self.steps, |mut steps| async move {
            steps.recv().await.map(|step| (step, steps))
        })
    }

    /// Wait for the run to finish and return every step it emitted
    pub async fn collect(mut self) -> Vec<Step> {
        let mut all = Vec::new();
        while let Some(step) = self.steps.recv().await {
            all.push(step);
        }
        all
    }
}
