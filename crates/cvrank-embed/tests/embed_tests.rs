use cvrank_embed::{embed_cached, EmbeddingCache, HashingEmbedder};
use cvrank_core::traits::{dot, Embedder};

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let embedder = HashingEmbedder::new(256);
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");

    assert_eq!(embs[0].len(), 256);

    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in embs[0].iter().zip(embs[1].iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn cache_round_trip_matches_direct_embedding() {
    let embedder = HashingEmbedder::default();
    let cache = EmbeddingCache::new(32);
    let texts: Vec<String> = ["python fastapi", "java spring", "python fastapi"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let cached = embed_cached(&embedder, &cache, &texts).expect("cached");
    let direct = embedder.embed_batch(&texts).expect("direct");
    for (a, b) in cached.iter().zip(direct.iter()) {
        assert!((dot(a, b) - 1.0).abs() < 1e-6);
    }
    // duplicate text produced a cache hit
    let (hits, _) = cache.stats();
    assert!(hits >= 1);
}
