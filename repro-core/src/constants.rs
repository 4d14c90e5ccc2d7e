use crate::WorkloadShape;
use std::time::Duration;

/// Declared byte length of every blob the workload creates.
pub const BLOB_SIZE: u64 = 4096;

/// Workload shape for the sequential variant: 100 container cycles of
/// 100 blobs each.
pub const SEQUENTIAL_SHAPE: WorkloadShape = WorkloadShape {
    containers: 100,
    blobs_per_container: 100,
    blob_size: BLOB_SIZE,
};

/// Workload shape for the Track 1 and Track 2 variants: 10 container
/// cycles of 100 blobs each.
pub const TRACK_SHAPE: WorkloadShape = WorkloadShape {
    containers: 10,
    blobs_per_container: 100,
    blob_size: BLOB_SIZE,
};

/// Ceiling on how long the pooled variants wait for outstanding
/// container cycles before proceeding to diagnosis.
pub const POOL_WAIT_CEILING: Duration = Duration::from_secs(5 * 60);

/// Pause between the two load rounds of the legacy variant. Wide
/// enough for the peer to invalidate idle pooled connections.
pub const ROUND_PAUSE: Duration = Duration::from_secs(10);

/// Local debugging proxy endpoint used when proxying is enabled.
pub const PROXY_ADDR: &str = "localhost:8888";

/// Fixed-delay retry defaults matching the Track 2 variant: three
/// retries after the initial attempt, one second apart.
pub const RETRY_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(1);
