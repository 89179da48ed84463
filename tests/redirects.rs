//! Redirect resolution through the engine facade.

mod common;

use std::sync::Arc;

use common::{engine, engine_with_hops, titles, MockBackend};
use ekn_engine::{CancellationToken, EngineError, EknId, QueryDescriptor};

fn search() -> QueryDescriptor {
    QueryDescriptor::builder().query("lannister").domain("foo").build()
}

#[tokio::test]
async fn test_redirect_substituted_in_place() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("a", "Jaime", None)
            .with_object("b", "Imp", Some("t"))
            .with_object("c", "Cersei", None)
            .with_object("t", "Tyrion", None)
            .with_search_order(&["a", "b", "c"]),
    );

    let batch = engine(&backend)
        .get_objects_by_query(&search(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(titles(&batch.results), ["Jaime", "Tyrion", "Cersei"]);
    assert_eq!(batch.results[1].id(), &EknId::parse("ekn://foo/t").unwrap());
    assert!(batch.results.iter().all(|m| !m.is_redirect()));
    assert_eq!(batch.hits, 3);
}

#[tokio::test]
async fn test_shared_target_fetched_once() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("a", "Imp", Some("t"))
            .with_object("b", "Halfman", Some("t"))
            .with_object("c", "Bronn", Some("s"))
            .with_object("t", "Tyrion", None)
            .with_object("s", "Ser Bronn", None)
            .with_search_order(&["a", "b", "c"]),
    );

    let batch = engine(&backend)
        .get_objects_by_query(&search(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(titles(&batch.results), ["Tyrion", "Tyrion", "Ser Bronn"]);
    assert_eq!(batch.results[0], batch.results[1]);

    // One search, then a single batched lookup naming each target once
    assert_eq!(backend.request_count(), 2);
    assert_eq!(backend.id_lookups(), [vec!["t".to_string(), "s".to_string()]]);
}

#[tokio::test]
async fn test_chain_of_three_takes_three_rounds() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("a", "A", Some("b"))
            .with_object("b", "B", Some("c"))
            .with_object("c", "C", Some("d"))
            .with_object("d", "D", None)
            .with_search_order(&["a"]),
    );

    let batch = engine(&backend)
        .get_objects_by_query(&search(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(titles(&batch.results), ["D"]);
    assert_eq!(backend.id_lookups(), [["b"], ["c"], ["d"]]);
    assert_eq!(backend.request_count(), 4);
}

#[tokio::test]
async fn test_chain_at_hop_limit_resolves() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("a", "A", Some("b"))
            .with_object("b", "B", Some("c"))
            .with_object("c", "C", Some("d"))
            .with_object("d", "D", None)
            .with_search_order(&["a"]),
    );

    let batch = engine_with_hops(&backend, 3)
        .get_objects_by_query(&search(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(titles(&batch.results), ["D"]);
}

#[tokio::test]
async fn test_chain_beyond_hop_limit_is_a_loop() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("a", "A", Some("b"))
            .with_object("b", "B", Some("c"))
            .with_object("c", "C", Some("d"))
            .with_object("d", "D", None)
            .with_search_order(&["a"]),
    );

    let err = engine_with_hops(&backend, 2)
        .get_objects_by_query(&search(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::RedirectLoop { hops: 2 }), "got {err:?}");
    // Search plus the two permitted rounds, nothing after
    assert_eq!(backend.request_count(), 3);
}

#[tokio::test]
async fn test_cycle_stops_at_hop_limit() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("a", "A", Some("b"))
            .with_object("b", "B", Some("a"))
            .with_search_order(&["a"]),
    );

    let err = engine(&backend)
        .get_objects_by_query(&search(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::RedirectLoop { hops: 16 }), "got {err:?}");
    assert_eq!(backend.request_count(), 17);
}

#[tokio::test]
async fn test_dangling_target_fails_whole_batch() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("a", "Jaime", None)
            .with_object("b", "Imp", Some("gone"))
            .with_search_order(&["a", "b"]),
    );

    let err = engine(&backend)
        .get_objects_by_query(&search(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        EngineError::UnresolvedRedirect { source_id, target } => {
            assert_eq!(source_id, "ekn://foo/b");
            assert_eq!(target, "ekn://foo/gone");
        }
        other => panic!("expected UnresolvedRedirect, got {other:?}"),
    }
}

#[tokio::test]
async fn test_redirects_left_alone_when_not_following() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("b", "Imp", Some("t"))
            .with_object("t", "Tyrion", None)
            .with_search_order(&["b"]),
    );

    let batch = engine(&backend)
        .query_objects(&search(), &CancellationToken::new(), false)
        .await
        .unwrap();

    assert_eq!(titles(&batch.results), ["Imp"]);
    assert!(batch.results[0].is_redirect());
    assert_eq!(backend.request_count(), 1);
}

#[tokio::test]
async fn test_get_by_id_follows_chain() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("a", "A", Some("b"))
            .with_object("b", "B", Some("c"))
            .with_object("c", "C", None),
    );

    let model = engine(&backend)
        .get_object_by_id(&EknId::parse("ekn://foo/a").unwrap(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(model.title(), "C");
    assert_eq!(backend.id_lookups(), [["a"], ["b"], ["c"]]);
}

#[tokio::test]
async fn test_get_by_id_dangling_redirect() {
    let backend = Arc::new(MockBackend::new().with_object("a", "A", Some("gone")));

    let err = engine(&backend)
        .get_object_by_id(&EknId::parse("ekn://foo/a").unwrap(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(&err, EngineError::UnresolvedRedirect { target, .. } if target == "ekn://foo/gone"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_get_by_id_cycle_is_a_loop() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("a", "A", Some("b"))
            .with_object("b", "B", Some("a")),
    );

    let err = engine_with_hops(&backend, 4)
        .get_object_by_id(&EknId::parse("ekn://foo/a").unwrap(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::RedirectLoop { hops: 4 }), "got {err:?}");
    assert_eq!(backend.request_count(), 5);
}

#[tokio::test]
async fn test_cross_domain_target_fetched_from_its_own_domain() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("b", "Imp", Some("ekn://bar/t"))
            .with_object_in("bar", "t", "Tyrion", None)
            .with_search_order(&["b"]),
    );

    let batch = engine(&backend)
        .get_objects_by_query(&search(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(titles(&batch.results), ["Tyrion"]);
    assert_eq!(batch.results[0].id(), &EknId::parse("ekn://bar/t").unwrap());
    assert_eq!(backend.paths(), ["/srv/ekn/foo/db", "/srv/ekn/bar/db"]);
}

#[tokio::test]
async fn test_one_round_batches_per_target_domain() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("a", "Imp", Some("ekn://bar/t"))
            .with_object("b", "Bronn", Some("s"))
            .with_object("c", "Halfman", Some("ekn://bar/t"))
            .with_object_in("bar", "t", "Tyrion", None)
            .with_object("s", "Ser Bronn", None)
            .with_search_order(&["a", "b", "c"]),
    );

    let batch = engine(&backend)
        .get_objects_by_query(&search(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(titles(&batch.results), ["Tyrion", "Ser Bronn", "Tyrion"]);
    // Search, then one lookup per domain in first-seen order
    assert_eq!(
        backend.paths(),
        ["/srv/ekn/foo/db", "/srv/ekn/bar/db", "/srv/ekn/foo/db"]
    );
    assert_eq!(backend.id_lookups(), [["t"], ["s"]]);
}

#[tokio::test]
async fn test_default_domain_target_resolves_in_both_paths() {
    let backend = Arc::new(
        MockBackend::new()
            .with_object("b", "Imp", Some("ekn:///t"))
            .with_object("t", "Tyrion", None)
            .with_search_order(&["b"]),
    );
    let engine = engine(&backend);
    let cancel = CancellationToken::new();

    let by_id = engine
        .get_object_by_id(&EknId::parse("ekn://foo/b").unwrap(), &cancel)
        .await
        .unwrap();
    let by_query = engine.get_objects_by_query(&search(), &cancel).await.unwrap();

    assert_eq!(by_id.title(), "Tyrion");
    assert_eq!(by_query.results, [by_id]);
}

#[tokio::test]
async fn test_both_paths_agree_on_mixed_chain() {
    // foo/a -> bar/b -> default-domain c -> terminal foo/c
    let backend = Arc::new(
        MockBackend::new()
            .with_object("a", "A", Some("ekn://bar/b"))
            .with_object_in("bar", "b", "B", Some("ekn:///c"))
            .with_object("c", "C", None)
            .with_search_order(&["a"]),
    );
    let engine = engine(&backend);
    let cancel = CancellationToken::new();

    let by_id = engine
        .get_object_by_id(&EknId::parse("ekn://foo/a").unwrap(), &cancel)
        .await
        .unwrap();
    let id_paths = backend.paths();

    let by_query = engine.get_objects_by_query(&search(), &cancel).await.unwrap();
    let query_paths = backend.paths()[id_paths.len()..].to_vec();

    assert_eq!(by_id.id(), &EknId::parse("ekn://foo/c").unwrap());
    assert_eq!(by_query.results, [by_id]);
    assert_eq!(id_paths, ["/srv/ekn/foo/db", "/srv/ekn/bar/db", "/srv/ekn/foo/db"]);
    assert_eq!(query_paths, id_paths);
}
