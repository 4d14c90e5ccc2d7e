mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tls13_repro::diagnose::{diagnose, ProcfsInspector, IDLE_POOL_NEEDLE};
    use tls13_repro::store::ObjectStore;
    use tls13_repro::workload::{clear_account, run_pooled, run_sequential};
    use tls13_repro_core::{container_name, RetrySettings};

    #[tokio::test]
    async fn sequential_workload_round_trips() {
        init().await;
        let _guard = exclusive().await;
        mock_store::reset();

        let store = test_store();
        let report = run_sequential(&store, small_shape(4, 5)).await;

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.failures(), 0);
        assert_eq!(mock_store::blobs_put(), 20);
        assert!(mock_store::live_containers().is_empty());
        for i in 0..4 {
            let name = container_name(i);
            assert_eq!(mock_store::created_counts().get(&name), Some(&1));
            assert_eq!(mock_store::deleted_counts().get(&name), Some(&1));
        }
    }

    #[tokio::test]
    async fn pooled_cycles_create_and_delete_each_name_exactly_once() {
        init().await;
        let _guard = exclusive().await;
        mock_store::reset();

        let store = Arc::new(test_store());
        let report = run_pooled(store, small_shape(10, 3), Duration::from_secs(60)).await;

        assert_eq!(report.outcomes.len(), 10);
        assert_eq!(report.failures(), 0);

        let expected: HashSet<String> = (0..10).map(container_name).collect();
        let created = mock_store::created_counts();
        let deleted = mock_store::deleted_counts();
        assert_eq!(created.keys().cloned().collect::<HashSet<_>>(), expected);
        assert!(created.values().all(|&count| count == 1));
        assert_eq!(deleted.keys().cloned().collect::<HashSet<_>>(), expected);
        assert!(deleted.values().all(|&count| count == 1));
        assert!(mock_store::live_containers().is_empty());
    }

    #[tokio::test]
    async fn clear_account_empties_the_account() {
        init().await;
        let _guard = exclusive().await;
        mock_store::reset();

        let store = test_store();
        store.create_container("stale0").await.unwrap();
        store.create_container("stale1").await.unwrap();

        clear_account(&store).await.unwrap();

        assert!(mock_store::live_containers().is_empty());
        // Deleting the already-gone containers again is not an error.
        assert!(!store.delete_container_if_exists("stale0").await.unwrap());
    }

    #[tokio::test]
    async fn healthy_run_ends_with_a_clean_diagnosis() {
        init().await;
        let _guard = exclusive().await;
        mock_store::reset();

        let store = test_store();
        let report = run_sequential(&store, small_shape(2, 3)).await;
        report.log();
        assert_eq!(report.failures(), 0);

        let diagnosis = diagnose(&ProcfsInspector::new(), IDLE_POOL_NEEDLE).unwrap();
        assert!(diagnosis.blocked.is_empty());
        assert!(diagnosis.verdict().is_ok());
    }

    // reqwest's blocking client refuses to run inside an async
    // runtime, so this drives the legacy round from a plain test and
    // only borrows a runtime for the shared setup.
    #[test]
    fn blocking_round_cycles_each_container_exactly_once() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = rt.block_on(async {
            init().await;
            let guard = exclusive().await;
            mock_store::reset();
            guard
        });

        let store = Arc::new(blocking_test_store());
        store.create_container("stale0").unwrap();

        let report = tls13_repro::workload::blocking::run_round(
            &store,
            small_shape(10, 2),
            Duration::from_secs(60),
        );

        // Ten cycle outcomes plus the trailing bare-name delete,
        // which fails because that container never existed.
        assert_eq!(report.outcomes.len(), 11);
        let trailing = report.outcomes.last().unwrap();
        assert_eq!(trailing.container, "container");
        assert!(trailing.result.is_err());
        assert_eq!(report.failures(), 1);

        assert_eq!(mock_store::blobs_put(), 20);
        assert!(mock_store::live_containers().is_empty());
        // The pre-clear removed the stale container before the round.
        assert_eq!(mock_store::deleted_counts().get("stale0"), Some(&1));
        for i in 0..10 {
            let name = container_name(i);
            assert_eq!(mock_store::created_counts().get(&name), Some(&1));
            assert_eq!(mock_store::deleted_counts().get(&name), Some(&1));
        }
    }

    #[tokio::test]
    async fn retries_follow_the_initial_attempt() {
        init().await;
        let _guard = exclusive().await;
        mock_store::reset();

        let store = retrying_store(RetrySettings {
            attempts: 2,
            delay: Duration::from_millis(10),
        });
        store.create_container("retry0").await.unwrap();

        // Two server errors are absorbed by one initial attempt plus
        // two retries.
        mock_store::fail_next_puts(2);
        store.put_blob("retry0", "blob0", 64).await.unwrap();

        // Without retries configured a single server error surfaces.
        let plain = test_store();
        mock_store::fail_next_puts(1);
        assert!(plain.put_blob("retry0", "blob1", 64).await.is_err());

        store.delete_container("retry0").await.unwrap();
    }

    #[tokio::test]
    async fn workload_failures_do_not_escape_the_report() {
        init().await;
        let _guard = exclusive().await;
        mock_store::reset();

        let store = test_store();
        // Occupy a name so the second create of it conflicts.
        store.create_container(&container_name(1)).await.unwrap();

        let report = run_sequential(&store, small_shape(3, 2)).await;

        // The conflicting cycle failed but the others completed, and
        // control still reaches this point for the diagnosis step.
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failures(), 1);
        assert!(report.outcomes[1].result.is_err());

        let diagnosis = diagnose(&ProcfsInspector::new(), IDLE_POOL_NEEDLE).unwrap();
        assert!(diagnosis.verdict().is_ok());
    }
}
