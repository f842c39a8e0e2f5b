//! # Topology Resolution
//!
//! Seed discovery and session lifecycle seen from the service layer: every
//! document call must reach the node that owns its shard, and every session
//! opened for a run must be closed at the end of it.

#[cfg(test)]
mod tests {
    use vbd_sharding::adapters::CallKind;
    use vbd_sharding::{
        ConnectionConfig, DocumentDoctorApi, DoctorService, InMemoryCluster, LocatorError,
        TopologyDescriptor, DEFAULT_COLLECTION,
    };

    fn config_for(host: &str) -> ConnectionConfig {
        ConnectionConfig {
            host: host.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_full_scan_routes_each_shard_to_its_owner() {
        let cluster = InMemoryCluster::new(64, &["n1:11210", "n2:11210", "n3:11210"]);
        let service = DoctorService::connect(&config_for("n2"), &cluster).await.unwrap();
        cluster.clear_calls();

        service.locate("abc123", DEFAULT_COLLECTION, true).await.unwrap();

        let gets: Vec<_> = cluster
            .calls()
            .into_iter()
            .filter(|c| c.kind == CallKind::Get)
            .collect();
        assert_eq!(gets.len(), 64);
        for call in gets {
            let shard = call.shard.unwrap();
            let owner = format!("n{}:11210", shard % 3 + 1);
            assert_eq!(call.node.to_string(), owner, "shard {shard}");
        }
    }

    #[tokio::test]
    async fn test_seed_host_placeholder_resolves_to_seed() {
        let descriptor = TopologyDescriptor::round_robin(&["$HOST:11210"], 128);
        let cluster = InMemoryCluster::from_descriptor(descriptor, "db.internal");
        cluster.insert(7, DEFAULT_COLLECTION, "x", b"{}", 0);

        let service = DoctorService::connect(&config_for("db.internal"), &cluster)
            .await
            .unwrap();
        assert_eq!(service.shard_count().get(), 128);
        let found = service.locate("x", DEFAULT_COLLECTION, true).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].shard, 7);

        service.close().await.unwrap();
        assert_eq!(cluster.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_shard_count_follows_the_topology() {
        let cluster = InMemoryCluster::new(1024, &["n1:11210"]);
        let service = DoctorService::connect(&config_for("n1"), &cluster).await.unwrap();
        assert_eq!(service.expected_shard("abc123"), 770);
    }

    #[tokio::test]
    async fn test_rejected_credentials_abort_before_any_lookup() {
        let cluster = InMemoryCluster::new(64, &["n1:11210"]);
        cluster.require_credentials("ops", "s3cret");

        let err = DoctorService::connect(&config_for("n1"), &cluster)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LocatorError::Authentication { .. }));
        assert!(err.is_fatal());
        assert_eq!(cluster.open_sessions(), 0);

        let config = ConnectionConfig {
            username: "ops".to_string(),
            password: "s3cret".to_string(),
            ..config_for("n1")
        };
        let service = DoctorService::connect(&config, &cluster).await.unwrap();
        service.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_partial_connect_failure_leaks_no_sessions() {
        let cluster = InMemoryCluster::new(64, &["n1:11210", "n2:11210", "n3:11210"]);
        cluster.fail_connect_to("n3:11210");

        let err = DoctorService::connect(&config_for("n1"), &cluster)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LocatorError::Connection { .. }));
        assert_eq!(cluster.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_close_sends_one_close_per_session() {
        let cluster = InMemoryCluster::new(64, &["n1:11210", "n2:11210"]);
        let service = DoctorService::connect(&config_for("n1"), &cluster).await.unwrap();
        assert_eq!(service.session().connection_count(), 2);
        cluster.clear_calls();

        service.close().await.unwrap();

        let closes = cluster
            .calls()
            .iter()
            .filter(|c| c.kind == CallKind::Close)
            .count();
        assert_eq!(closes, 2);
        assert_eq!(cluster.open_sessions(), 0);
    }
}
