use tracing::{debug, warn};

use crate::events::{EventSink, MaskTarget, ViewerEvent};
use crate::mask_sync::MaskJob;

/// Run an alpha scan on the blocking pool; the UI thread applies the result.
pub fn spawn_mask_job<S: EventSink>(target: MaskTarget, job: MaskJob, sink: S) {
    let generation = job.generation;
    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || job.run()).await {
            Ok(result) => {
                if !sink.deliver(ViewerEvent::MaskReady { target, result }) {
                    debug!(generation, "viewer gone before mask finished");
                }
            }
            Err(err) => warn!(generation, error = %err, "mask task panicked"),
        }
    });
}
