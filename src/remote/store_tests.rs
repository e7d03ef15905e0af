// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for the in-memory shadow store.

#[cfg(test)]
mod tests {
    use crate::errors::StoreError;
    use crate::remote::meta::ModelMeta;
    use crate::remote::record::RemoteModel;
    use crate::remote::store::{MemoryStore, NewShadowRow, ShadowStore};
    use crate::remote::test_support::{Flavor, Server};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn new_row(remote_id: &str) -> NewShadowRow {
        NewShadowRow {
            remote_id: remote_id.into(),
            columns: BTreeMap::new(),
        }
    }

    fn flavor_meta() -> ModelMeta {
        Flavor::describe().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_local_ids() {
        let store = MemoryStore::new();
        let meta = flavor_meta();

        let a = store.insert(&meta, new_row("a")).await.unwrap();
        let b = store.insert(&meta, new_row("b")).await.unwrap();
        assert!(b.local_id > a.local_id);

        let ids: Vec<_> = store
            .all(&meta)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.remote_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_remote_id_is_unique_per_model() {
        let store = MemoryStore::new();
        let flavor = flavor_meta();
        let server = Server::describe().unwrap();

        store.insert(&flavor, new_row("x")).await.unwrap();
        assert_eq!(
            store.insert(&flavor, new_row("x")).await.unwrap_err(),
            StoreError::DuplicateRemoteId {
                model: "Flavor".into(),
                remote_id: "x".into()
            }
        );
        store.insert(&server, new_row("x")).await.unwrap();
    }

    #[tokio::test]
    async fn test_filter_get_exclude() {
        let store = MemoryStore::new();
        let meta = flavor_meta();
        let mut owned = new_row("a");
        owned.columns.insert("owner".into(), json!("ops"));
        store.insert(&meta, owned).await.unwrap();
        store.insert(&meta, new_row("b")).await.unwrap();
        store.insert(&meta, new_row("c")).await.unwrap();

        let ops = store.filter(&meta, &[("owner", json!("ops"))]).await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].remote_id, "a");

        let b = store.get(&meta, &[("remote_id", json!("b"))]).await.unwrap();
        let others = store
            .exclude(&meta, &[("local_id", json!(b.local_id))])
            .await
            .unwrap();
        assert_eq!(others.len(), 2);
        assert!(others.iter().all(|row| row.remote_id != "b"));
    }

    #[tokio::test]
    async fn test_get_signals_are_distinguishable() {
        let store = MemoryStore::new();
        let meta = flavor_meta();
        store.insert(&meta, new_row("a")).await.unwrap();
        store.insert(&meta, new_row("b")).await.unwrap();

        assert_eq!(
            store.get(&meta, &[("remote_id", json!("z"))]).await.unwrap_err(),
            StoreError::NotFound {
                model: "Flavor".into()
            }
        );
        assert_eq!(
            store.get(&meta, &[]).await.unwrap_err(),
            StoreError::MultipleFound {
                model: "Flavor".into(),
                count: 2
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_column_is_rejected() {
        let store = MemoryStore::new();
        let meta = flavor_meta();
        assert!(!store.can_filter(&meta, "name"));
        assert!(store.can_filter(&meta, "owner"));
        assert_eq!(
            store.filter(&meta, &[("name", json!("m1"))]).await.unwrap_err(),
            StoreError::UnknownColumn {
                model: "Flavor".into(),
                key: "name".into()
            }
        );
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryStore::new();
        let meta = flavor_meta();
        let mut row = store.insert(&meta, new_row("a")).await.unwrap();

        row.columns.insert("owner".into(), json!("dev"));
        store.update(&meta, &row).await.unwrap();
        assert_eq!(store.all(&meta).await.unwrap(), vec![row.clone()]);

        store.delete(&meta, row.local_id).await.unwrap();
        assert!(store.all(&meta).await.unwrap().is_empty());
        assert!(matches!(
            store.delete(&meta, row.local_id).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
