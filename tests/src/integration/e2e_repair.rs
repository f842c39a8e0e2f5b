//! # End-to-End Repair Flows
//!
//! Resolver, locator and repair engine driven through `DoctorService` and
//! `BatchDriver` against a two-node in-memory cluster.
//!
//! Reference placements with 64 shards: `abc123` hashes to shard 2 (owned
//! by n1) and `a` hashes to shard 55 (owned by n2).

#[cfg(test)]
mod tests {
    use vbd_sharding::adapters::CallKind;
    use vbd_sharding::{
        shard_of, BatchDriver, BatchOptions, ConnectionConfig, DocumentDoctorApi, DoctorService,
        InMemoryCluster, MemoryRecordSink, RecordAction, RecordOutcome, RepairAction,
        RepairOptions, ShardCount, DEFAULT_COLLECTION,
    };

    // =========================================================================
    // Helpers
    // =========================================================================

    fn two_node_cluster() -> InMemoryCluster {
        InMemoryCluster::new(64, &["n1:11210", "n2:11210"])
    }

    async fn connect(cluster: &InMemoryCluster) -> DoctorService {
        let config = ConnectionConfig {
            host: "n1".to_string(),
            ..Default::default()
        };
        DoctorService::connect(&config, cluster).await.unwrap()
    }

    fn repair_everything() -> BatchOptions {
        BatchOptions {
            search_all_shards: true,
            repair: RepairOptions {
                restore: true,
                delete: true,
            },
            ..Default::default()
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // =========================================================================
    // Misplaced document is moved home
    // =========================================================================

    #[test]
    fn test_reference_placements() {
        let shards = ShardCount::new(64).unwrap();
        assert_eq!(shard_of(b"abc123", shards), 2);
        assert_eq!(shard_of(b"a", shards), 55);
        assert_eq!(shard_of(b"abc123", ShardCount::new(1024).unwrap()), 770);
    }

    #[tokio::test]
    async fn test_misplaced_document_moves_to_computed_shard() {
        let cluster = two_node_cluster();
        cluster.insert(3, DEFAULT_COLLECTION, "abc123", br#"{"name":"x"}"#, 7);
        let service = connect(&cluster).await;

        let mut sink = MemoryRecordSink::new();
        let result = BatchDriver::new(&service, repair_everything())
            .run(&ids(&["abc123"]), &mut sink)
            .await
            .unwrap();

        assert_eq!(cluster.shards_holding(DEFAULT_COLLECTION, "abc123"), vec![2]);
        let restored = cluster.document(2, DEFAULT_COLLECTION, "abc123").unwrap();
        assert_eq!(restored.value, br#"{"name":"x"}"#.to_vec());
        assert_eq!(restored.flags, 7);

        assert_eq!(result.found, 1);
        assert_eq!(result.not_found, 0);
        assert_eq!(result.restored, 1);
        assert_eq!(result.deleted, 1);
        assert!(result.is_clean());

        let steps: Vec<(RecordAction, RecordOutcome)> = sink
            .records()
            .iter()
            .map(|r| (r.action, r.outcome))
            .collect();
        assert_eq!(
            steps,
            vec![
                (RecordAction::Locate, RecordOutcome::Found),
                (RecordAction::Restore, RecordOutcome::Created),
                (RecordAction::Delete, RecordOutcome::Deleted),
            ]
        );
        assert_eq!(sink.records()[0].shard, Some(3));
        assert_eq!(sink.records()[0].expected_shard, Some(2));

        service.close().await.unwrap();
        assert_eq!(cluster.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_restore_and_delete_reach_the_owning_nodes() {
        let cluster = two_node_cluster();
        cluster.insert(3, DEFAULT_COLLECTION, "abc123", b"{}", 0);
        let service = connect(&cluster).await;
        cluster.clear_calls();

        let mut sink = MemoryRecordSink::new();
        BatchDriver::new(&service, repair_everything())
            .run(&ids(&["abc123"]), &mut sink)
            .await
            .unwrap();

        let calls = cluster.calls();
        let add = calls.iter().find(|c| c.kind == CallKind::Add).unwrap();
        assert_eq!(add.node.to_string(), "n1:11210");
        assert_eq!(add.shard, Some(2));
        let delete = calls.iter().find(|c| c.kind == CallKind::Delete).unwrap();
        assert_eq!(delete.node.to_string(), "n2:11210");
        assert_eq!(delete.shard, Some(3));
    }

    #[tokio::test]
    async fn test_repair_is_idempotent() {
        let cluster = two_node_cluster();
        cluster.insert(3, DEFAULT_COLLECTION, "abc123", b"{}", 0);
        let service = connect(&cluster).await;
        let driver = BatchDriver::new(&service, repair_everything());

        let mut first = MemoryRecordSink::new();
        driver.run(&ids(&["abc123"]), &mut first).await.unwrap();
        cluster.clear_calls();

        let mut second = MemoryRecordSink::new();
        let result = driver.run(&ids(&["abc123"]), &mut second).await.unwrap();

        assert_eq!(result.found, 1);
        assert_eq!(result.restored, 0);
        assert_eq!(result.deleted, 0);
        assert_eq!(second.records().len(), 1);
        assert_eq!(second.records()[0].shard, Some(2));
        assert!(cluster
            .calls()
            .iter()
            .all(|c| !matches!(c.kind, CallKind::Add | CallKind::Delete)));
    }

    // =========================================================================
    // Edge cases
    // =========================================================================

    #[tokio::test]
    async fn test_absent_document_triggers_no_repair() {
        let cluster = two_node_cluster();
        let service = connect(&cluster).await;
        cluster.clear_calls();

        let mut sink = MemoryRecordSink::new();
        let result = BatchDriver::new(&service, repair_everything())
            .run(&ids(&["ghost"]), &mut sink)
            .await
            .unwrap();

        assert_eq!(result.not_found, 1);
        assert_eq!(result.found, 0);
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.records()[0].outcome, RecordOutcome::NotFound);

        let calls = cluster.calls();
        assert_eq!(calls.iter().filter(|c| c.kind == CallKind::Get).count(), 64);
        assert!(calls
            .iter()
            .all(|c| !matches!(c.kind, CallKind::Add | CallKind::Delete)));
    }

    #[tokio::test]
    async fn test_existing_correct_copy_is_kept() {
        let cluster = two_node_cluster();
        let correct_cas = cluster.insert(2, DEFAULT_COLLECTION, "abc123", br#"{"v":"new"}"#, 0);
        cluster.insert(40, DEFAULT_COLLECTION, "abc123", br#"{"v":"old"}"#, 0);
        let service = connect(&cluster).await;

        let mut sink = MemoryRecordSink::new();
        let result = BatchDriver::new(&service, repair_everything())
            .run(&ids(&["abc123"]), &mut sink)
            .await
            .unwrap();

        assert_eq!(result.found, 2);
        assert_eq!(result.already_present, 1);
        assert_eq!(result.deleted, 1);
        assert_eq!(cluster.shards_holding(DEFAULT_COLLECTION, "abc123"), vec![2]);
        let kept = cluster.document(2, DEFAULT_COLLECTION, "abc123").unwrap();
        assert_eq!(kept.cas, correct_cas);
        assert_eq!(kept.value, br#"{"v":"new"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_copy_modified_after_locate_is_not_deleted() {
        let cluster = two_node_cluster();
        cluster.insert(3, DEFAULT_COLLECTION, "abc123", b"{}", 0);
        let service = connect(&cluster).await;

        let locations = service.locate("abc123", DEFAULT_COLLECTION, true).await.unwrap();
        assert_eq!(locations.len(), 1);
        let stale_cas = locations[0].cas;
        cluster.touch(3, DEFAULT_COLLECTION, "abc123").unwrap();

        let actions = service
            .repair(
                "abc123",
                DEFAULT_COLLECTION,
                &locations,
                RepairOptions {
                    restore: true,
                    delete: true,
                },
            )
            .await;

        assert!(matches!(actions[0], RepairAction::Restored { to_shard: 2, .. }));
        assert_eq!(
            actions[1],
            RepairAction::DeleteConflict {
                shard: 3,
                cas: stale_cas
            }
        );
        assert_eq!(
            cluster.shards_holding(DEFAULT_COLLECTION, "abc123"),
            vec![2, 3]
        );
    }

    #[tokio::test]
    async fn test_unreachable_target_keeps_the_only_copy() {
        let cluster = two_node_cluster();
        cluster.insert(3, DEFAULT_COLLECTION, "abc123", b"{}", 0);
        let service = connect(&cluster).await;
        cluster.fail_operations_on("n1:11210");

        let locations = service.locate("abc123", DEFAULT_COLLECTION, false).await;
        assert!(locations.is_err());

        let mut sink = MemoryRecordSink::new();
        let options = BatchOptions {
            search_all_shards: false,
            ..repair_everything()
        };
        let result = BatchDriver::new(&service, options)
            .run(&ids(&["abc123", "a"]), &mut sink)
            .await
            .unwrap();

        // abc123 hashes to a shard on the failing node; `a` lives on n2
        assert_eq!(result.failed, 1);
        assert_eq!(result.not_found, 1);
        assert_eq!(cluster.shards_holding(DEFAULT_COLLECTION, "abc123"), vec![3]);
    }

    #[tokio::test]
    async fn test_fast_path_misses_misplaced_copy() {
        let cluster = two_node_cluster();
        cluster.insert(3, DEFAULT_COLLECTION, "abc123", b"{}", 0);
        let service = connect(&cluster).await;

        let fast = service.locate("abc123", DEFAULT_COLLECTION, false).await.unwrap();
        assert!(fast.is_empty());
        let full = service.locate("abc123", DEFAULT_COLLECTION, true).await.unwrap();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].shard, 3);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let cluster = two_node_cluster();
        cluster.insert(3, "app.users", "abc123", b"{}", 0);
        let service = connect(&cluster).await;

        let in_default = service.locate("abc123", DEFAULT_COLLECTION, true).await.unwrap();
        assert!(in_default.is_empty());

        let options = BatchOptions {
            collection: "app.users".to_string(),
            ..repair_everything()
        };
        let mut sink = MemoryRecordSink::new();
        let result = BatchDriver::new(&service, options)
            .run(&ids(&["abc123"]), &mut sink)
            .await
            .unwrap();

        assert_eq!(result.restored, 1);
        assert_eq!(cluster.shards_holding("app.users", "abc123"), vec![2]);
        assert!(cluster.shards_holding(DEFAULT_COLLECTION, "abc123").is_empty());
    }
}
