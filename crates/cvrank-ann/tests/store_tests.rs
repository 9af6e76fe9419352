use cvrank_ann::{AnnStore, IndexKind};

fn sample_vectors() -> (Vec<String>, Vec<Vec<f32>>) {
    let ids = vec!["cv-a".to_string(), "cv-b".to_string(), "cv-c".to_string()];
    let vectors = vec![
        vec![1.0, 0.0, 0.0],
        vec![0.0, 1.0, 0.0],
        vec![0.9, 0.1, 0.0],
    ];
    (ids, vectors)
}

#[test]
fn build_search_roundtrip_flat() {
    let dir = tempfile::tempdir().unwrap();
    let store = AnnStore::new(dir.path(), IndexKind::Flat);
    let (ids, vectors) = sample_vectors();
    store.build(ids, vectors).unwrap();

    let hits = store.search(&[vec![1.0, 0.0, 0.0]], 2).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0][0].0, "cv-a");
    assert!((hits[0][0].1 - 1.0).abs() < 1e-5);
    assert_eq!(hits[0][1].0, "cv-c");
}

#[test]
fn persisted_index_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = AnnStore::new(dir.path(), IndexKind::Hnsw);
        let (ids, vectors) = sample_vectors();
        store.build(ids, vectors).unwrap();
    }

    let store = AnnStore::new(dir.path(), IndexKind::Hnsw);
    store.load().unwrap();
    assert_eq!(store.len(), 3);

    let hits = store.search(&[vec![0.0, 1.0, 0.0]], 1).unwrap();
    assert_eq!(hits[0][0].0, "cv-b");
    assert!((hits[0][0].1 - 1.0).abs() < 1e-5);
}

#[test]
fn add_appends_and_repersists() {
    let dir = tempfile::tempdir().unwrap();
    let store = AnnStore::new(dir.path(), IndexKind::Flat);
    let (ids, vectors) = sample_vectors();
    store.build(ids, vectors).unwrap();

    store
        .add(vec!["cv-d".to_string()], vec![vec![0.0, 0.0, 1.0]])
        .unwrap();
    assert_eq!(store.len(), 4);

    let fresh = AnnStore::new(dir.path(), IndexKind::Flat);
    fresh.load().unwrap();
    let hits = fresh.search(&[vec![0.0, 0.0, 1.0]], 1).unwrap();
    assert_eq!(hits[0][0].0, "cv-d");
}

#[test]
fn meta_and_ids_side_files_exist() {
    let dir = tempfile::tempdir().unwrap();
    let store = AnnStore::new(dir.path(), IndexKind::Flat);
    let (ids, vectors) = sample_vectors();
    store.build(ids, vectors).unwrap();

    let meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("meta.json")).unwrap())
            .unwrap();
    assert_eq!(meta["dim"], 3);
    assert_eq!(meta["count"], 3);
    assert_eq!(meta["metric"], "cosine");
    assert_eq!(meta["kind"], "flat");
    assert!(meta["created_at"].is_string());

    let ids_raw = std::fs::read_to_string(dir.path().join("ids.jsonl")).unwrap();
    let lines: Vec<&str> = ids_raw.lines().collect();
    assert_eq!(lines, vec!["\"cv-a\"", "\"cv-b\"", "\"cv-c\""]);
}

#[test]
fn dimension_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = AnnStore::new(dir.path(), IndexKind::Flat);
    let (ids, vectors) = sample_vectors();
    store.build(ids, vectors).unwrap();

    assert!(store.search(&[vec![1.0, 0.0]], 1).is_err());
    assert!(store
        .add(vec!["cv-x".to_string()], vec![vec![1.0]])
        .is_err());
}
