//! Fetch loop orchestration -- batch sequencing, pause waits and pacing.

use std::sync::Arc;

use super::batching::process_batch;
use super::context::FetchRun;

impl FetchRun {
    /// Run the batch loop to completion or abort
    ///
    /// Per batch:
    /// 1. Wait while paused; exit if aborted
    /// 2. Load every chapter of the batch concurrently and join
    /// 3. Publish progress and report cached chapter ids
    /// 4. Sleep `batch_delay` unless this was the last batch
    pub(crate) async fn execute(mut self) {
        let work = Arc::clone(&self.work);
        let config = Arc::clone(&self.orchestrator.config);
        let batch_size = config.batch_size.max(1);
        let total = work.chapters.len();
        let batch_count = total.div_ceil(batch_size);

        for (index, batch) in work.chapters.chunks(batch_size).enumerate() {
            if self.handle.is_paused() {
                tracing::debug!(work_id = %work.id, batch = index, "Fetch loop waiting while paused");
            }
            if !self
                .handle
                .wait_until_runnable(config.pause_poll_interval)
                .await
            {
                tracing::debug!(
                    work_id = %work.id,
                    processed = self.processed,
                    "Abort observed before batch"
                );
                return;
            }

            let outcome = process_batch(&self.orchestrator, &work, batch).await;
            tracing::debug!(
                work_id = %work.id,
                batch = index,
                succeeded = outcome.succeeded,
                from_network = outcome.from_network,
                failed = outcome.failed,
                "Batch fetched"
            );

            self.processed = (self.processed + batch.len()).min(total);
            self.orchestrator
                .publish_progress(&work.id, self.handle.run_id(), self.processed);
            self.orchestrator.notify_cached(&work.id, outcome.reported);

            let is_last = index + 1 == batch_count;
            if !is_last && !self.handle.sleep(config.batch_delay).await {
                tracing::debug!(
                    work_id = %work.id,
                    processed = self.processed,
                    "Abort observed during batch delay"
                );
                return;
            }
        }

        self.completed = true;
    }
}
