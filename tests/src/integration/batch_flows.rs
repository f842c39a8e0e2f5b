//! # Batch Flows
//!
//! Whole tool invocations through `vbd_doctor::execute`: argument parsing,
//! identifier files, seed mode and the JSON-lines output contract.

#[cfg(test)]
mod tests {
    use std::io::Write;

    use async_trait::async_trait;
    use clap::Parser;
    use serde_json::Value;
    use vbd_doctor::{execute, Args};
    use vbd_sharding::{
        AddOutcome, BatchDriver, BatchOptions, ConnectionConfig, DocumentDoctorApi,
        DocumentLocation, DoctorService, InMemoryCluster, LocatorError, MemoryRecordSink,
        RecordOutcome, RepairAction, RepairOptions, ShardCount, ShardIndex, DEFAULT_COLLECTION,
    };

    // =========================================================================
    // Helpers
    // =========================================================================

    const NODE: &str = "localhost:11210";

    fn args(list: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("vbd-doctor").chain(list.iter().copied())).unwrap()
    }

    fn lines(out: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    // =========================================================================
    // Seed, then repair
    // =========================================================================

    #[tokio::test]
    async fn test_seed_then_repair_round_trip() {
        let cluster = InMemoryCluster::new(64, &[NODE]);

        let mut out = Vec::new();
        let seeded = execute(&args(&["--id", "abc123", "--seed-vb", "3"]), &cluster, &mut out)
            .await
            .unwrap();
        assert_eq!(seeded.seeded, 1);
        assert_eq!(cluster.shards_holding(DEFAULT_COLLECTION, "abc123"), vec![3]);
        let placeholder = cluster.document(3, DEFAULT_COLLECTION, "abc123").unwrap();
        assert_eq!(placeholder.value, b"{}".to_vec());

        let mut out = Vec::new();
        let repaired = execute(
            &args(&[
                "--id",
                "abc123",
                "--search-all-vbs",
                "--restore",
                "--delete",
            ]),
            &cluster,
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(cluster.shards_holding(DEFAULT_COLLECTION, "abc123"), vec![2]);
        assert_eq!(repaired.found, 1);
        assert_eq!(repaired.not_found, 0);
        assert!(repaired.is_clean());

        let lines = lines(&out);
        let summary = &lines.last().unwrap()["summary"];
        assert_eq!(summary["found"], 1);
        assert_eq!(summary["restored"], 1);
        assert_eq!(summary["deleted"], 1);
        assert_eq!(cluster.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_seeding_twice_reports_existing_document() {
        let cluster = InMemoryCluster::new(64, &[NODE]);
        let seed = args(&["--id", "abc123", "--seed-vb", "3"]);

        execute(&seed, &cluster, Vec::new()).await.unwrap();
        let mut out = Vec::new();
        let again = execute(&seed, &cluster, &mut out).await.unwrap();

        assert_eq!(again.seeded, 0);
        assert_eq!(lines(&out)[0]["outcome"], "already_exists");
    }

    // =========================================================================
    // Output contract
    // =========================================================================

    #[tokio::test]
    async fn test_records_carry_shards_and_optional_values() {
        let cluster = InMemoryCluster::new(64, &[NODE]);
        cluster.insert(9, DEFAULT_COLLECTION, "abc123", br#"{"k":1}"#, 0);

        let mut out = Vec::new();
        execute(
            &args(&["--id", "abc123", "--search-all-vbs", "--value"]),
            &cluster,
            &mut out,
        )
        .await
        .unwrap();

        let found = &lines(&out)[0];
        assert_eq!(found["action"], "locate");
        assert_eq!(found["outcome"], "found");
        assert_eq!(found["shard"], 9);
        assert_eq!(found["expected_shard"], 2);
        assert_eq!(found["value"], r#"{"k":1}"#);

        let mut quiet = Vec::new();
        execute(&args(&["--id", "abc123", "--search-all-vbs"]), &cluster, &mut quiet)
            .await
            .unwrap();
        assert!(lines(&quiet)[0].get("value").is_none());
    }

    #[tokio::test]
    async fn test_ids_file_and_flags_processed_in_order() {
        let cluster = InMemoryCluster::new(64, &[NODE]);
        cluster.insert(55, DEFAULT_COLLECTION, "a", b"{}", 0);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["a", "b"]"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let mut out = Vec::new();
        let result = execute(
            &args(&["--id", "first", "--ids-file", path.as_str()]),
            &cluster,
            &mut out,
        )
        .await
        .unwrap();

        let ids: Vec<String> = lines(&out)
            .iter()
            .filter_map(|l| l["id"].as_str().map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["first", "a", "b"]);
        assert_eq!(result.found, 1);
        assert_eq!(result.not_found, 2);
    }

    #[tokio::test]
    async fn test_collection_flag_scopes_lookups() {
        let cluster = InMemoryCluster::new(64, &[NODE]);
        cluster.insert(2, "inventory.items", "abc123", b"{}", 0);

        let mut out = Vec::new();
        let result = execute(
            &args(&["--id", "abc123", "--collection", "inventory.items"]),
            &cluster,
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(result.found, 1);

        let result = execute(&args(&["--id", "abc123"]), &cluster, Vec::new())
            .await
            .unwrap();
        assert_eq!(result.not_found, 1);
    }

    // =========================================================================
    // Failure isolation
    // =========================================================================

    /// Service wrapper whose lookups fail for one identifier.
    struct FlakyLookup {
        inner: DoctorService,
        poisoned: &'static str,
    }

    #[async_trait]
    impl DocumentDoctorApi for FlakyLookup {
        fn shard_count(&self) -> ShardCount {
            self.inner.shard_count()
        }

        fn expected_shard(&self, id: &str) -> ShardIndex {
            self.inner.expected_shard(id)
        }

        async fn locate(
            &self,
            id: &str,
            collection: &str,
            search_all_shards: bool,
        ) -> Result<Vec<DocumentLocation>, LocatorError> {
            if id == self.poisoned {
                return Err(LocatorError::Timeout(10));
            }
            self.inner.locate(id, collection, search_all_shards).await
        }

        async fn repair(
            &self,
            id: &str,
            collection: &str,
            locations: &[DocumentLocation],
            options: RepairOptions,
        ) -> Vec<RepairAction> {
            self.inner.repair(id, collection, locations, options).await
        }

        async fn seed(
            &self,
            id: &str,
            collection: &str,
            shard: ShardIndex,
        ) -> Result<AddOutcome, LocatorError> {
            self.inner.seed(id, collection, shard).await
        }
    }

    #[tokio::test]
    async fn test_one_failed_lookup_does_not_stop_the_batch() {
        let cluster = InMemoryCluster::new(64, &[NODE]);
        cluster.insert(3, DEFAULT_COLLECTION, "abc123", b"{}", 0);
        let config = ConnectionConfig::default();
        let api = FlakyLookup {
            inner: DoctorService::connect(&config, &cluster).await.unwrap(),
            poisoned: "slow",
        };

        let options = BatchOptions {
            search_all_shards: true,
            repair: RepairOptions {
                restore: true,
                delete: true,
            },
            ..Default::default()
        };
        let identifiers: Vec<String> = ["slow", "abc123"].iter().map(|s| s.to_string()).collect();
        let mut sink = MemoryRecordSink::new();
        let result = BatchDriver::new(&api, options)
            .run(&identifiers, &mut sink)
            .await
            .unwrap();

        assert_eq!(result.failed, 1);
        assert_eq!(result.restored, 1);
        assert!(!result.is_clean());
        assert_eq!(sink.records()[0].outcome, RecordOutcome::Failed);
        assert!(sink.records()[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("timed out"));
        assert_eq!(cluster.shards_holding(DEFAULT_COLLECTION, "abc123"), vec![2]);

        api.inner.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_node_failure_marks_run_unclean() {
        // `a` hashes to shard 55, owned by the second node
        let cluster = InMemoryCluster::new(64, &[NODE, "replica:11210"]);
        cluster.insert(2, DEFAULT_COLLECTION, "abc123", b"{}", 0);
        cluster.fail_operations_on("replica:11210");

        let mut out = Vec::new();
        let result = execute(&args(&["--id", "a", "--id", "abc123"]), &cluster, &mut out)
            .await
            .unwrap();

        assert_eq!(result.failed, 1);
        assert_eq!(result.found, 1);
        let lines = lines(&out);
        assert_eq!(lines[0]["outcome"], "failed");
        assert_eq!(lines[1]["outcome"], "found");
        assert_eq!(lines[2]["summary"]["failed"], 1);
        assert_eq!(cluster.open_sessions(), 0);
    }
}
