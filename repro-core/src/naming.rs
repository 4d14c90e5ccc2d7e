/// Fixed shape of one load run: how many container cycles, how many
/// blobs inside each, and the declared blob size.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadShape {
    pub containers: usize,
    pub blobs_per_container: usize,
    pub blob_size: u64,
}

/// Deterministic container name for cycle `i`. Names are recreated
/// each run; nothing persists across invocations.
pub fn container_name(i: usize) -> String {
    format!("container{i}")
}

/// Deterministic blob name for inner index `j`.
pub fn blob_name(j: usize) -> String {
    format!("blob{j}")
}
