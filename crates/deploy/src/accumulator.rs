//! Buffer of chain-mutating calls submitted together as one batch.

use crate::{
    chain::{ChainClient, PendingCall, Receipt},
    error::{DeployError, DeployResult},
};

/// Ordered buffer of pending calls.
///
/// The accumulator never retries: a failed flush leaves every call in place so
/// the caller can decide whether to resubmit.
#[derive(Debug, Clone, Default)]
pub struct CallAccumulator {
    calls: Vec<PendingCall>,
}

impl CallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call and return its index in the upcoming batch.
    pub fn enqueue(&mut self, call: PendingCall) -> usize {
        tracing::debug!(
            target_address = %call.target,
            entrypoint = %call.entrypoint,
            position = self.calls.len(),
            "Call enqueued"
        );
        self.calls.push(call);
        self.calls.len() - 1
    }

    pub fn pending(&self) -> &[PendingCall] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Submit the buffered calls without clearing them.
    ///
    /// An empty buffer returns no receipts and does not contact the chain.
    pub async fn submit<C: ChainClient>(&self, client: &C) -> DeployResult<Vec<Receipt>> {
        if self.calls.is_empty() {
            tracing::debug!("No pending calls to submit");
            return Ok(Vec::new());
        }

        tracing::info!(calls = self.calls.len(), "Executing batch...");

        let receipts = client
            .execute_batch(&self.calls)
            .await
            .map_err(|cause| DeployError::BatchExecutionFailed {
                calls: self.calls.len(),
                cause,
            })?;

        if receipts.len() != self.calls.len() {
            return Err(DeployError::BatchExecutionFailed {
                calls: self.calls.len(),
                cause: anyhow::anyhow!(
                    "chain returned {} receipt(s) for {} call(s)",
                    receipts.len(),
                    self.calls.len()
                ),
            });
        }

        Ok(receipts)
    }

    /// Drop every buffered call.
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Submit the buffered calls as one batch and clear the buffer on success.
    pub async fn flush<C: ChainClient>(&mut self, client: &C) -> DeployResult<Vec<Receipt>> {
        let receipts = self.submit(client).await?;
        self.clear();
        Ok(receipts)
    }
}
