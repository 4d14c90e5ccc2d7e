//! Thread diagnoser: walks the live threads of the process looking
//! for frames belonging to the transport's idle-connection cache.
//!
//! The introspection facility is an external collaborator reached
//! through the [`ThreadInspector`] trait; the shipped implementation
//! reads procfs. Matching a private implementation detail by substring
//! is inherently fragile, so the rule lives in one named predicate and
//! one constant.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Substring identifying the transport stack's idle-connection pool in
/// a captured frame. A thread parked inside this module after the load
/// phase is the bug's symptom.
pub const IDLE_POOL_NEEDLE: &str = "client::pool";

/// Bound on individual procfs file reads. The files involved are tiny;
/// the cap keeps a misbehaving mount from stalling the diagnosis.
const MAX_PROC_READ: u64 = 4096;

#[derive(Debug, Error)]
pub enum DiagnoseError {
    #[error("failed to read {path}: {source}")]
    Procfs {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("found {0} thread(s) blocked on the idle-connection cache")]
    BlockedThreads(usize),
}

/// Point-in-time record of one live thread.
#[derive(Debug, Clone)]
pub struct ThreadRecord {
    pub tid: u32,
    pub name: String,
    pub state: char,
    pub frames: Vec<String>,
}

impl fmt::Display for ThreadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "thread {} \"{}\" state={}", self.tid, self.name, self.state)?;
        for frame in &self.frames {
            writeln!(f, "    at {frame}")?;
        }
        Ok(())
    }
}

/// Narrow interface to the runtime's thread-introspection facility:
/// one point-in-time snapshot of all live threads.
pub trait ThreadInspector {
    fn snapshot(&self) -> Result<Vec<ThreadRecord>, DiagnoseError>;
}

/// Procfs-backed inspector. Enumerates `self/task/<tid>/`, taking the
/// thread name from `comm`, the scheduler state from `stat`, and the
/// frames from `stack` when readable (it usually needs privilege),
/// falling back to the single `wchan` symbol.
pub struct ProcfsInspector {
    root: PathBuf,
}

impl ProcfsInspector {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Uses an alternative procfs root, so tests can point the
    /// inspector at a fixture tree.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_thread(&self, dir: &Path, tid: u32) -> io::Result<ThreadRecord> {
        let name = read_bounded(&dir.join("comm"))?.trim_end().to_string();
        let state = parse_stat_state(&read_bounded(&dir.join("stat"))?).unwrap_or('?');

        let frames = match read_bounded(&dir.join("stack")) {
            Ok(stack) if !stack.trim().is_empty() => stack
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect(),
            _ => match read_bounded(&dir.join("wchan")) {
                Ok(wchan) if !wchan.trim().is_empty() && wchan.trim() != "0" => {
                    vec![wchan.trim().to_string()]
                }
                _ => Vec::new(),
            },
        };

        Ok(ThreadRecord {
            tid,
            name,
            state,
            frames,
        })
    }
}

impl Default for ProcfsInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadInspector for ProcfsInspector {
    fn snapshot(&self) -> Result<Vec<ThreadRecord>, DiagnoseError> {
        let task_dir = self.root.join("self/task");
        let entries = std::fs::read_dir(&task_dir).map_err(|source| DiagnoseError::Procfs {
            path: task_dir.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let Some(tid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };

            match self.read_thread(&entry.path(), tid) {
                Ok(record) => records.push(record),
                // Threads can exit between the listing and the reads.
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(tid, "thread exited during snapshot");
                }
                Err(source) => {
                    return Err(DiagnoseError::Procfs {
                        path: entry.path(),
                        source,
                    })
                }
            }
        }

        records.sort_by_key(|record| record.tid);
        Ok(records)
    }
}

fn read_bounded(path: &Path) -> io::Result<String> {
    let mut contents = String::new();
    File::open(path)?
        .take(MAX_PROC_READ)
        .read_to_string(&mut contents)?;
    Ok(contents)
}

/// Extracts the state character from a stat line of the form
/// `123 (comm) S ...`; the comm field may itself contain parentheses.
fn parse_stat_state(stat: &str) -> Option<char> {
    let after_comm = &stat[stat.rfind(')')? + 1..];
    after_comm.split_whitespace().next()?.chars().next()
}

/// The single match rule: is this thread blocked in the
/// idle-connection cache? True iff any captured frame contains the
/// needle.
pub fn blocked_on_idle_pool(record: &ThreadRecord, needle: &str) -> bool {
    record.frames.iter().any(|frame| frame.contains(needle))
}

/// Outcome of one diagnosis pass.
#[derive(Debug)]
pub struct Diagnosis {
    pub blocked: Vec<ThreadRecord>,
}

impl Diagnosis {
    /// Prints every blocked thread and turns "any thread matched" into
    /// the run's pass/fail signal. The count does not matter, only the
    /// presence.
    pub fn verdict(&self) -> Result<(), DiagnoseError> {
        if self.blocked.is_empty() {
            println!("No blocked threads found.");
            Ok(())
        } else {
            for record in &self.blocked {
                println!("{record}");
            }
            Err(DiagnoseError::BlockedThreads(self.blocked.len()))
        }
    }
}

/// Snapshots the live threads and filters them through the idle-pool
/// predicate.
pub fn diagnose(
    inspector: &dyn ThreadInspector,
    needle: &str,
) -> Result<Diagnosis, DiagnoseError> {
    let snapshot = inspector.snapshot()?;
    debug!(threads = snapshot.len(), "captured thread snapshot");
    let blocked = snapshot
        .into_iter()
        .filter(|record| blocked_on_idle_pool(record, needle))
        .collect();
    Ok(Diagnosis { blocked })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeInspector(Vec<ThreadRecord>);

    impl ThreadInspector for FakeInspector {
        fn snapshot(&self) -> Result<Vec<ThreadRecord>, DiagnoseError> {
            Ok(self.0.clone())
        }
    }

    fn record(tid: u32, frames: &[&str]) -> ThreadRecord {
        ThreadRecord {
            tid,
            name: format!("worker-{tid}"),
            state: 'S',
            frames: frames.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn clean_snapshot_is_a_success() {
        let inspector = FakeInspector(vec![
            record(1, &["std::thread::park", "main"]),
            record(2, &[]),
        ]);
        let diagnosis = diagnose(&inspector, IDLE_POOL_NEEDLE).unwrap();
        assert!(diagnosis.blocked.is_empty());
        assert!(diagnosis.verdict().is_ok());
    }

    #[test]
    fn one_match_fails_the_run() {
        let inspector = FakeInspector(vec![
            record(1, &["main"]),
            record(2, &["hyper::client::pool::IdleTask::poll", "tokio park"]),
        ]);
        let diagnosis = diagnose(&inspector, IDLE_POOL_NEEDLE).unwrap();
        assert_eq!(diagnosis.blocked.len(), 1);
        assert_eq!(diagnosis.blocked[0].tid, 2);
        assert!(matches!(
            diagnosis.verdict(),
            Err(DiagnoseError::BlockedThreads(1))
        ));
    }

    #[test]
    fn failure_is_independent_of_match_count() {
        let matching = record(7, &["x::client::pool::checkout"]);
        for count in 1..4 {
            let inspector = FakeInspector(vec![matching.clone(); count]);
            let diagnosis = diagnose(&inspector, IDLE_POOL_NEEDLE).unwrap();
            assert!(matches!(
                diagnosis.verdict(),
                Err(DiagnoseError::BlockedThreads(n)) if n == count
            ));
        }
    }

    #[test]
    fn predicate_matches_any_frame_position() {
        let top = record(1, &["a::client::pool::b", "bottom"]);
        let bottom = record(2, &["top", "a::client::pool::b"]);
        let none = record(3, &["top", "bottom"]);
        assert!(blocked_on_idle_pool(&top, IDLE_POOL_NEEDLE));
        assert!(blocked_on_idle_pool(&bottom, IDLE_POOL_NEEDLE));
        assert!(!blocked_on_idle_pool(&none, IDLE_POOL_NEEDLE));
    }

    #[test]
    fn stat_state_parsing_handles_parens_in_comm() {
        assert_eq!(parse_stat_state("42 (tokio-runtime-w) S 1 2 3"), Some('S'));
        assert_eq!(parse_stat_state("42 (we(ird) name)) R 1"), Some('R'));
        assert_eq!(parse_stat_state("garbage"), None);
    }

    #[test]
    fn procfs_fixture_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let task = dir.path().join("self/task/42");
        std::fs::create_dir_all(&task).unwrap();
        std::fs::write(task.join("comm"), "repro-worker\n").unwrap();
        std::fs::write(task.join("stat"), "42 (repro-worker) S 1 42 1\n").unwrap();
        std::fs::write(
            task.join("stack"),
            "[<0>] futex_wait_queue+0x60/0xa0\n[<0>] do_futex+0x106/0x1b0\n",
        )
        .unwrap();

        let inspector = ProcfsInspector::with_root(dir.path());
        let snapshot = inspector.snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        let record = &snapshot[0];
        assert_eq!(record.tid, 42);
        assert_eq!(record.name, "repro-worker");
        assert_eq!(record.state, 'S');
        assert_eq!(record.frames.len(), 2);
        assert!(record.frames[0].contains("futex_wait_queue"));
    }

    #[test]
    fn live_procfs_snapshot_sees_this_thread() {
        let inspector = ProcfsInspector::new();
        let snapshot = inspector.snapshot().unwrap();
        assert!(!snapshot.is_empty());
        assert!(snapshot.windows(2).all(|w| w[0].tid < w[1].tid));
    }
}
