// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for the synchronization engine.

#[cfg(test)]
mod tests {
    use crate::config::Compatibility;
    use crate::errors::{ModelError, OpenStackError, StoreError};
    use crate::remote::meta::ModelMeta;
    use crate::remote::objects::{SyncContext, SyncReport};
    use crate::remote::record::{RecordState, RemoteModel};
    use crate::remote::store::{Filters, MemoryStore, NewShadowRow, ShadowRow, ShadowStore};
    use crate::remote::test_support::{
        mount_item, mount_listing, objects, objects_with, Flavor, Server,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn seed(store: &MemoryStore, meta: &ModelMeta, remote_ids: &[&str]) -> Vec<ShadowRow> {
        let mut rows = Vec::new();
        for remote_id in remote_ids {
            let row = store
                .insert(
                    meta,
                    NewShadowRow {
                        remote_id: (*remote_id).to_string(),
                        columns: BTreeMap::new(),
                    },
                )
                .await
                .unwrap();
            rows.push(row);
        }
        rows
    }

    fn remote_ids(rows: &[ShadowRow]) -> Vec<&str> {
        rows.iter().map(|row| row.remote_id.as_str()).collect()
    }

    /// Memory store whose deletes always fail.
    struct FailingDeleteStore(MemoryStore);

    #[async_trait]
    impl ShadowStore for FailingDeleteStore {
        async fn insert(&self, meta: &ModelMeta, row: NewShadowRow) -> Result<ShadowRow, StoreError> {
            self.0.insert(meta, row).await
        }

        async fn update(&self, meta: &ModelMeta, row: &ShadowRow) -> Result<(), StoreError> {
            self.0.update(meta, row).await
        }

        async fn get(&self, meta: &ModelMeta, filters: &Filters<'_>) -> Result<ShadowRow, StoreError> {
            self.0.get(meta, filters).await
        }

        async fn filter(
            &self,
            meta: &ModelMeta,
            filters: &Filters<'_>,
        ) -> Result<Vec<ShadowRow>, StoreError> {
            self.0.filter(meta, filters).await
        }

        async fn all(&self, meta: &ModelMeta) -> Result<Vec<ShadowRow>, StoreError> {
            self.0.all(meta).await
        }

        async fn exclude(
            &self,
            meta: &ModelMeta,
            filters: &Filters<'_>,
        ) -> Result<Vec<ShadowRow>, StoreError> {
            self.0.exclude(meta, filters).await
        }

        async fn delete(&self, _meta: &ModelMeta, _local_id: u64) -> Result<(), StoreError> {
            Err(StoreError::Backend("database is locked".into()))
        }
    }

    // =====================================================
    // create
    // =====================================================

    #[tokio::test]
    async fn test_create_posts_targets_under_label_and_stores_remote_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/compute/flavors/"))
            .and(body_json(json!({"flavor": {"name": "m1.small", "ram": 2048}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"flavor": {"id": "f-1", "name": "m1.small", "ram": 2048}}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        let flavor = flavors
            .create(&[("name", json!("m1.small")), ("ram", json!(2048))])
            .await
            .unwrap();

        assert_eq!(flavor.record().remote_id(), Some("f-1"));
        assert_eq!(flavor.record().state(), RecordState::Live);
        assert!(flavor.record().is_persisted());

        let rows = store.all(flavors.meta()).await.unwrap();
        assert_eq!(remote_ids(&rows), vec!["f-1"]);
        assert_eq!(Some(rows[0].local_id), flavor.record().local_id());
    }

    #[tokio::test]
    async fn test_create_sends_reference_targets_and_write_only_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/compute/servers/"))
            .and(body_json(json!({"server": {
                "name": "web-1",
                "imageRef": "abc",
                "flavorRef": "f-1",
                "adminPass": "hunter2"
            }})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"server": {"id": "s-1"}})))
            .expect(1)
            .mount(&server)
            .await;

        let (servers, _store) = objects::<Server>(&server);
        let created = servers
            .create(&[
                ("name", json!("web-1")),
                ("image", json!("abc")),
                ("flavor", json!("f-1")),
                ("admin_pass", json!("hunter2")),
            ])
            .await
            .unwrap();
        assert_eq!(created.record().remote_id(), Some("s-1"));
    }

    #[tokio::test]
    async fn test_create_remote_failure_persists_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/compute/flavors/"))
            .respond_with(ResponseTemplate::new(409).set_body_string("Flavor already exists"))
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        let err = flavors
            .create(&[("name", json!("m1.small")), ("ram", json!(2048))])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ModelError::Remote(OpenStackError::Conflict("Flavor already exists".into()))
        );
        assert!(store.all(flavors.meta()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_without_id_in_response_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/compute/flavors/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"flavor": {}})))
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        let err = flavors.create(&[("ram", json!(512))]).await.unwrap_err();

        assert!(matches!(err, ModelError::Remote(OpenStackError::InvalidResponse(_))));
        assert!(store.all(flavors.meta()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_collects_every_field_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (flavors, _store) = objects::<Flavor>(&server);
        let err = flavors
            .create(&[("name", json!("x".repeat(40))), ("ram", json!(-1))])
            .await
            .unwrap_err();

        let ModelError::Validation(errors) = err else {
            panic!("expected validation errors, got {err:?}");
        };
        assert_eq!(errors.fields(), vec!["name", "ram"]);
        assert_eq!(
            errors.get("ram"),
            Some(&["Must be a positive integer".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_build_rejects_unknown_field() {
        let server = MockServer::start().await;
        let (flavors, _store) = objects::<Flavor>(&server);
        assert!(matches!(
            flavors.build(&[("swap", json!(0))]),
            Err(ModelError::UnknownField { .. })
        ));
    }

    // =====================================================
    // unique fields
    // =====================================================

    #[tokio::test]
    async fn test_unique_field_rejects_existing_value() {
        let server = MockServer::start().await;
        mount_item(&server, "flavors", "flavor", "a", json!({"id": "a", "name": "m1.tiny"})).await;
        mount_item(&server, "flavors", "flavor", "b", json!({"id": "b", "name": "m1.small"})).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a", "b"]).await;

        let err = flavors
            .create(&[("name", json!("m1.small")), ("ram", json!(2048))])
            .await
            .unwrap_err();
        let ModelError::Validation(errors) = err else {
            panic!("expected validation errors, got {err:?}");
        };
        assert_eq!(errors.fields(), vec!["name"]);
        assert_eq!(errors.get("name"), Some(&["Must be unique.".to_string()][..]));
    }

    #[tokio::test]
    async fn test_unique_field_never_clashes_with_itself() {
        let server = MockServer::start().await;
        mount_item(&server, "flavors", "flavor", "a", json!({"id": "a", "name": "m1.tiny", "ram": 512})).await;
        mount_item(&server, "flavors", "flavor", "b", json!({"id": "b", "name": "m1.small"})).await;
        Mock::given(method("PATCH"))
            .and(path("/compute/flavors/a"))
            .and(header("OpenStack-API-Version", "compute 2.55"))
            .and(body_json(json!({"flavor": {"name": "m1.tiny", "ram": 1024}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"flavor": {"id": "a"}})))
            .expect(1)
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a", "b"]).await;

        let mut tiny = flavors.get(&[("remote_id", json!("a"))]).await.unwrap();
        flavors.refresh(&mut tiny).await.unwrap();
        tiny.record_mut().set("ram", 1024).unwrap();

        flavors.validate_unique(&tiny, &[]).await.unwrap();
        flavors.save(&mut tiny, None).await.unwrap();
        assert_eq!(store.all(flavors.meta()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_validate_unique_honors_exclude() {
        let server = MockServer::start().await;
        mount_item(&server, "flavors", "flavor", "a", json!({"id": "a", "name": "m1.tiny"})).await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a"]).await;

        let clash = flavors.build(&[("name", json!("m1.tiny"))]).unwrap();
        assert!(flavors.validate_unique(&clash, &[]).await.is_err());
        flavors.validate_unique(&clash, &["name"]).await.unwrap();
    }

    // =====================================================
    // save
    // =====================================================

    #[tokio::test]
    async fn test_save_restricts_payload_to_update_fields() {
        let server = MockServer::start().await;
        mount_item(
            &server,
            "flavors",
            "flavor",
            "a",
            json!({"id": "a", "name": "m1.tiny", "ram": 512, "vcpus": 1, "os-flavor-access:is_public": true}),
        )
        .await;
        Mock::given(method("PATCH"))
            .and(path("/compute/flavors/a"))
            .and(body_json(json!({"flavor": {"ram": 1024}})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a"]).await;

        let mut tiny = flavors.get(&[("remote_id", json!("a"))]).await.unwrap();
        flavors.refresh(&mut tiny).await.unwrap();
        tiny.record_mut().set("ram", 1024).unwrap();
        flavors.save(&mut tiny, Some(&["ram", "vcpus"])).await.unwrap();

        assert_eq!(tiny.record().remote_id(), Some("a"));
        assert_eq!(tiny.record().state(), RecordState::Live);
    }

    #[tokio::test]
    async fn test_save_persists_local_columns() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/compute/flavors/a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"flavor": {"id": "a"}})))
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a"]).await;

        let mut tiny = flavors.get(&[("remote_id", json!("a"))]).await.unwrap();
        tiny.record_mut().set("owner", "ops").unwrap();
        flavors.save(&mut tiny, None).await.unwrap();

        let rows = store.filter(flavors.meta(), &[("owner", json!("ops"))]).await.unwrap();
        assert_eq!(remote_ids(&rows), vec!["a"]);
    }

    // =====================================================
    // delete
    // =====================================================

    #[tokio::test]
    async fn test_delete_removes_remote_then_local() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/compute/flavors/a"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a", "b"]).await;

        let mut tiny = flavors.get(&[("remote_id", json!("a"))]).await.unwrap();
        flavors.delete(&mut tiny).await.unwrap();

        assert_eq!(tiny.record().state(), RecordState::Deleted);
        assert_eq!(tiny.record().local_id(), None);
        assert_eq!(remote_ids(&store.all(flavors.meta()).await.unwrap()), vec!["b"]);
    }

    #[tokio::test]
    async fn test_delete_remote_failure_keeps_local_row() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/compute/flavors/a"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a"]).await;

        let mut tiny = flavors.get(&[("remote_id", json!("a"))]).await.unwrap();
        let err = flavors.delete(&mut tiny).await.unwrap_err();

        assert_eq!(err.status_code(), 500);
        assert_eq!(remote_ids(&store.all(flavors.meta()).await.unwrap()), vec!["a"]);
        assert!(tiny.record().is_persisted());
    }

    #[tokio::test]
    async fn test_delete_local_failure_leaves_ghost_row() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/compute/flavors/a"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(FailingDeleteStore(MemoryStore::new()));
        let flavors = objects_with::<Flavor>(&server, store.clone());
        seed(&store.0, flavors.meta(), &["a"]).await;

        let mut tiny = flavors.get(&[("remote_id", json!("a"))]).await.unwrap();
        let err = flavors.delete(&mut tiny).await.unwrap_err();

        assert!(matches!(err, ModelError::Store(StoreError::Backend(_))));
        assert_eq!(remote_ids(&store.all(flavors.meta()).await.unwrap()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_delete_missing_remote_keeps_row_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/compute/flavors/a"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a"]).await;

        let mut tiny = flavors.get(&[("remote_id", json!("a"))]).await.unwrap();
        let err = flavors.delete(&mut tiny).await.unwrap_err();

        assert_eq!(err, ModelError::Remote(OpenStackError::NotFound("gone".into())));
        assert_eq!(store.all(flavors.meta()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_remote_forgiven_removes_row() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/compute/flavors/a"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        let flavors = flavors.with_compatibility(Compatibility {
            forgive_missing_on_delete: true,
            ..Compatibility::default()
        });
        seed(&store, flavors.meta(), &["a"]).await;

        let mut tiny = flavors.get(&[("remote_id", json!("a"))]).await.unwrap();
        flavors.delete(&mut tiny).await.unwrap();
        assert!(store.all(flavors.meta()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_new_record_is_not_persisted() {
        let server = MockServer::start().await;
        let (flavors, _store) = objects::<Flavor>(&server);
        let mut fresh = flavors.build(&[]).unwrap();
        assert_eq!(
            flavors.delete(&mut fresh).await.unwrap_err(),
            ModelError::NotPersisted {
                model: "Flavor".into()
            }
        );
    }

    // =====================================================
    // refresh and actions
    // =====================================================

    #[tokio::test]
    async fn test_refresh_discards_local_changes() {
        let server = MockServer::start().await;
        mount_item(&server, "flavors", "flavor", "a", json!({"id": "a", "name": "m1.tiny", "ram": 512})).await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a"]).await;

        let mut tiny = flavors.get(&[("remote_id", json!("a"))]).await.unwrap();
        assert_eq!(tiny.record().state(), RecordState::Shadow);
        tiny.record_mut().set("ram", 4096).unwrap();

        flavors.refresh(&mut tiny).await.unwrap();
        assert_eq!(tiny.record().get("ram"), Some(json!(512)));
        assert_eq!(tiny.record().state(), RecordState::Live);
    }

    #[tokio::test]
    async fn test_refresh_without_label_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/compute/flavors/a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"server": {}})))
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a"]).await;

        let mut tiny = flavors.get(&[("remote_id", json!("a"))]).await.unwrap();
        assert!(matches!(
            flavors.refresh(&mut tiny).await,
            Err(ModelError::Remote(OpenStackError::InvalidResponse(_)))
        ));
    }

    #[tokio::test]
    async fn test_action_posts_named_arguments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/compute/flavors/a/action"))
            .and(body_json(json!({"addTenantAccess": {"tenant": "p-1"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"flavor_access": [{"flavor_id": "a", "tenant_id": "p-1"}]}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a"]).await;

        let tiny = flavors.get(&[("remote_id", json!("a"))]).await.unwrap();
        let response = flavors
            .action(&tiny, "addTenantAccess", json!({"tenant": "p-1"}))
            .await
            .unwrap();
        assert_eq!(response["flavor_access"][0]["tenant_id"], "p-1");
    }

    // =====================================================
    // synchronize
    // =====================================================

    #[tokio::test]
    async fn test_synchronize_is_additive() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            "flavors",
            json!([{"id": "A"}, {"id": "B"}, {"id": "C"}]),
        )
        .await;

        let (flavors, store) = objects::<Flavor>(&server);
        let seeded = seed(&store, flavors.meta(), &["A", "B"]).await;

        let report = flavors.synchronize().await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                created: 1,
                skipped: 0,
                pruned: 0
            }
        );

        let rows = store.all(flavors.meta()).await.unwrap();
        assert_eq!(remote_ids(&rows), vec!["A", "B", "C"]);
        assert_eq!(rows[..2], seeded[..]);
    }

    #[tokio::test]
    async fn test_synchronize_keeps_remotely_deleted_rows() {
        let server = MockServer::start().await;
        mount_listing(&server, "flavors", json!([{"id": "A"}])).await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["A", "B"]).await;

        let report = flavors.synchronize().await.unwrap();
        assert_eq!(report, SyncReport::default());
        assert_eq!(remote_ids(&store.all(flavors.meta()).await.unwrap()), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_synchronize_prunes_when_enabled() {
        let server = MockServer::start().await;
        mount_listing(&server, "flavors", json!([{"id": "A"}])).await;

        let (flavors, store) = objects::<Flavor>(&server);
        let flavors = flavors.with_compatibility(Compatibility {
            prune_on_sync: true,
            ..Compatibility::default()
        });
        seed(&store, flavors.meta(), &["A", "B"]).await;

        let report = flavors.synchronize().await.unwrap();
        assert_eq!(report.pruned, 1);
        assert_eq!(remote_ids(&store.all(flavors.meta()).await.unwrap()), vec!["A"]);
    }

    #[tokio::test]
    async fn test_synchronize_skips_rejected_rows() {
        let server = MockServer::start().await;
        mount_listing(&server, "flavors", json!([{"id": "A"}, {"id": "A"}, {"id": 7}])).await;

        let (flavors, store) = objects::<Flavor>(&server);
        let report = flavors.synchronize().await.unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(remote_ids(&store.all(flavors.meta()).await.unwrap()), vec!["A", "7"]);
    }

    #[tokio::test]
    async fn test_synchronize_rejects_non_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/compute/flavors/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"flavors": {"id": "A"}})))
            .mount(&server)
            .await;

        let (flavors, _store) = objects::<Flavor>(&server);
        assert!(matches!(
            flavors.synchronize().await,
            Err(ModelError::Remote(OpenStackError::InvalidResponse(_)))
        ));
    }

    #[tokio::test]
    async fn test_synced_handle_does_not_recurse() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/compute/flavors/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"flavors": [{"id": "A"}, {"id": "B"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        let report = flavors.synced().synchronize().await.unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(store.all(flavors.meta()).await.unwrap().len(), 2);
    }

    #[test]
    fn test_sync_context_enter_once_per_model() {
        let root = SyncContext::new();
        let flavor = root.enter("Flavor").unwrap();
        assert!(flavor.is_active("Flavor"));
        assert!(!root.is_active("Flavor"));
        assert!(flavor.enter("Flavor").is_none());
        assert!(flavor.enter("Server").is_some());
    }

    #[tokio::test]
    async fn test_validate_skips_null_values() {
        let server = MockServer::start().await;
        let (flavors, _store) = objects::<Flavor>(&server);
        let empty = flavors.build(&[]).unwrap();
        flavors.validate(&empty).unwrap();

        let bad: Value = json!(12);
        let typed = flavors.build(&[("name", bad)]).unwrap();
        let errors = flavors.validate(&typed).unwrap_err();
        assert_eq!(errors.get("name"), Some(&["Must be a string".to_string()][..]));
    }

    #[tokio::test]
    async fn test_unique_check_without_values_reads_no_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"flavors": []})))
            .expect(0)
            .mount(&server)
            .await;

        let (flavors, store) = objects::<Flavor>(&server);
        seed(&store, flavors.meta(), &["a", "b"]).await;
        let synced = flavors.synced();
        let unnamed = synced.build(&[("ram", json!(512))]).unwrap();

        synced.validate_unique(&unnamed, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_model_name_in_meta() {
        let server = MockServer::start().await;
        let (flavors, _store) = objects::<Flavor>(&server);
        assert_eq!(flavors.meta().name(), Flavor::NAME);
    }
}
