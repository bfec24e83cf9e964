//! Background document assembly with cancellation.
//!
//! The assembler runs on the blocking pool against an owned snapshot, so a
//! cancelled or abandoned task never touches the live record.

use tokio::task::JoinHandle;

use super::{AssemblyError, DocumentAssembler, ExportArtifact};
use crate::cancel::{cancel_pair, CancelHandle};
use crate::record::RecordStore;

pub struct AssemblyTask {
    cancel: CancelHandle,
    join: JoinHandle<Result<ExportArtifact, AssemblyError>>,
}

impl AssemblyTask {
    /// Start assembling `snapshot` on the current tokio runtime. Fails with
    /// `Worker` when called outside one.
    pub fn spawn(
        assembler: DocumentAssembler,
        snapshot: RecordStore,
    ) -> Result<Self, AssemblyError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| AssemblyError::Worker("no async runtime".into()))?;
        let (cancel, mut signal) = cancel_pair();

        let join = runtime.spawn(async move {
            let work = tokio::task::spawn_blocking(move || assembler.assemble(&snapshot));
            tokio::select! {
                biased;
                () = signal.cancelled() => {
                    tracing::info!("Document assembly cancelled");
                    Err(AssemblyError::Cancelled)
                }
                joined = work => joined
                    .unwrap_or_else(|e| Err(AssemblyError::Worker(e.to_string()))),
            }
        });

        Ok(Self { cancel, join })
    }

    /// Abandon the assembly. The result of `join` becomes `Cancelled` unless
    /// the document was already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn join(self) -> Result<ExportArtifact, AssemblyError> {
        self.join
            .await
            .unwrap_or_else(|e| Err(AssemblyError::Worker(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::tests::complete_record;

    #[tokio::test]
    async fn completes_with_a_document() {
        let task = AssemblyTask::spawn(DocumentAssembler::default(), complete_record()).unwrap();
        let artifact = task.join().await.unwrap();
        assert_eq!(&artifact.bytes()[0..4], b"%PDF");
    }

    #[tokio::test]
    async fn cancel_before_completion_yields_cancelled() {
        let record = complete_record();
        let task = AssemblyTask::spawn(DocumentAssembler::default(), record.clone()).unwrap();
        // Current-thread runtime: the task has not been polled yet.
        task.cancel();
        assert_eq!(task.join().await.unwrap_err(), AssemblyError::Cancelled);
        assert_eq!(record, complete_record());
    }

    #[tokio::test]
    async fn cancel_after_completion_keeps_the_document() {
        let task = AssemblyTask::spawn(DocumentAssembler::default(), complete_record()).unwrap();
        while !task.is_finished() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        task.cancel();
        assert!(task.join().await.is_ok());
    }

    #[test]
    fn spawn_outside_runtime_is_an_error() {
        match AssemblyTask::spawn(DocumentAssembler::default(), complete_record()) {
            Err(AssemblyError::Worker(msg)) => assert_eq!(msg, "no async runtime"),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("spawned without a runtime"),
        }
    }
}
