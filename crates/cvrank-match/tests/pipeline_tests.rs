use cvrank_core::{Candidate, CancelToken, Error, Pair, RankRequest};
use cvrank_embed::{EmbeddingCache, HashingEmbedder};
use cvrank_match::features::{build_features, build_group_features, FeatureParams};
use cvrank_match::MatchService;
use cvrank_rank::{Dataset, Ranker, RankerParams};
use cvrank_text::{ExtractorConfig, SkillIndex, Skill, SkillVocabulary};

fn vocab() -> SkillVocabulary {
    let skill = |canonical: &str, aliases: &[&str]| Skill {
        canonical: canonical.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    };
    SkillVocabulary {
        skills: vec![
            skill("python", &["python", "python3"]),
            skill("fastapi", &["fastapi"]),
            skill("postgresql", &["postgresql", "postgres"]),
            skill("docker", &["docker"]),
            skill("aws", &["aws", "amazon web services"]),
            skill("java", &["java"]),
            skill("kafka", &["kafka"]),
            skill("kubernetes", &["kubernetes", "k8s"]),
            skill("react", &["react", "react.js"]),
            skill("terraform", &["terraform"]),
        ],
    }
}

fn index() -> SkillIndex {
    SkillIndex::build(vocab()).unwrap()
}

const JD: &str = "Python, FastAPI, PostgreSQL, Docker; nice to have: AWS";

fn five_resumes() -> Vec<(String, String)> {
    vec![
        (
            "cv-full".into(),
            "Python FastAPI PostgreSQL Docker and AWS experience".into(),
        ),
        ("cv-java".into(), "Java backend developer, Java EE".into()),
        (
            "cv-near".into(),
            "Python Kafka Postgres Docker Kubernetes".into(),
        ),
        ("cv-front".into(), "React frontend, css and html".into()),
        (
            "cv-devops".into(),
            "DevOps engineer, AWS and Terraform".into(),
        ),
    ]
}

fn exact_only() -> ExtractorConfig {
    ExtractorConfig {
        use_fuzzy: false,
        ..Default::default()
    }
}

#[test]
fn coverage_orders_the_five_resume_pool() {
    let index = index();
    let cache = EmbeddingCache::default();
    let vectors = build_group_features(
        &"jd-1".to_string(),
        JD,
        &five_resumes(),
        &index,
        None,
        &cache,
        &exact_only(),
        &FeatureParams::default(),
    );

    let coverage = |id: &str| {
        vectors
            .iter()
            .find(|v| v.cv_id == id)
            .map(|v| v.skill_coverage)
            .unwrap()
    };
    assert!(coverage("cv-full") > coverage("cv-java"));
    assert!(coverage("cv-full") > coverage("cv-front"));
    assert!(coverage("cv-near") > coverage("cv-java"));
    assert!(coverage("cv-near") > coverage("cv-front"));
}

#[test]
fn term_weights_boost_full_text_ranking() {
    let index = index();
    let cache = EmbeddingCache::default();
    let jd = "Python engineer with Kubernetes experience";
    // Symmetric pool: each resume matches exactly one query term with the
    // same tf and document length, so unweighted BM25 cannot split them.
    let candidates = vec![
        ("cv-py".to_string(), "Python developer".to_string()),
        ("cv-k8s".to_string(), "Kubernetes operator".to_string()),
    ];

    let plain = build_group_features(
        &"jd-w".to_string(),
        jd,
        &candidates,
        &index,
        None,
        &cache,
        &exact_only(),
        &FeatureParams::default(),
    );
    assert_eq!(plain[0].bm25_full_norm, plain[1].bm25_full_norm);

    let mut boosted_params = FeatureParams::default();
    boosted_params.term_weights.insert("kubernetes".to_string(), 3);
    let boosted = build_group_features(
        &"jd-w".to_string(),
        jd,
        &candidates,
        &index,
        None,
        &cache,
        &exact_only(),
        &boosted_params,
    );
    let score = |vs: &[cvrank_core::FeatureVector], id: &str| {
        vs.iter().find(|v| v.cv_id == id).unwrap().bm25_full_norm
    };
    assert!(score(&boosted, "cv-k8s") > score(&boosted, "cv-py"));
}

#[test]
fn empty_resume_scores_zero_without_panicking() {
    let index = index();
    let cache = EmbeddingCache::default();
    let candidates = vec![
        ("cv-empty".to_string(), "".to_string()),
        ("cv-real".to_string(), "Python and Docker".to_string()),
    ];
    let vectors = build_group_features(
        &"jd-1".to_string(),
        JD,
        &candidates,
        &index,
        None,
        &cache,
        &exact_only(),
        &FeatureParams::default(),
    );
    let empty = vectors.iter().find(|v| v.cv_id == "cv-empty").unwrap();
    // Smoothing floor only: no skills extracted from empty text.
    assert!(empty.skill_coverage < vectors[1].skill_coverage);
    assert_eq!(empty.bm25_full_norm, 0.0);
    assert_eq!(empty.bm25_skills_norm, 0.0);
}

#[test]
fn identical_texts_get_identical_scores() {
    let index = index();
    let cache = EmbeddingCache::default();
    let text = "Python FastAPI Docker".to_string();
    let candidates = vec![
        ("cv-a".to_string(), text.clone()),
        ("cv-b".to_string(), text),
    ];
    let embedder = HashingEmbedder::default();
    let vectors = build_group_features(
        &"jd-1".to_string(),
        JD,
        &candidates,
        &index,
        Some(&embedder),
        &cache,
        &exact_only(),
        &FeatureParams::default(),
    );
    assert_eq!(vectors[0].final_score, vectors[1].final_score);
    assert_eq!(vectors[0].skill_coverage, vectors[1].skill_coverage);
    assert_eq!(vectors[0].emb_cosine_norm, vectors[1].emb_cosine_norm);
}

#[test]
fn batch_builder_honors_cancellation() {
    let index = index();
    let cache = EmbeddingCache::default();
    let pairs: Vec<Pair> = five_resumes()
        .into_iter()
        .map(|(cv_id, resume_text)| Pair {
            jd_id: "jd-1".into(),
            cv_id,
            jd_text: JD.into(),
            resume_text,
        })
        .collect();

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = build_features(
        &pairs,
        &index,
        None,
        &cache,
        &exact_only(),
        &FeatureParams::default(),
        &cancel,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

fn trained_service() -> MatchService {
    let service = MatchService::new(Some(Box::new(HashingEmbedder::default())))
        .with_extractor(exact_only());
    service.load_vocabulary(vocab()).unwrap();

    // Train a small model where every feature pushes the score upward.
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    let mut groups = Vec::new();
    for g in 0..6 {
        for m in 0..4 {
            let s = m as f32 / 3.0;
            // Semantic column held at zero: the hashing embedder's
            // similarities are arbitrary, so the model must not lean on it.
            rows.push(vec![s, s * 0.8, s * 0.6, s * 0.7, 0.0]);
            labels.push(m as f32);
            groups.push(format!("train-{g}"));
        }
    }
    let mut ranker = Ranker::new(RankerParams {
        n_trees: 40,
        validation_fraction: 0.0,
        ..Default::default()
    });
    ranker.fit(Dataset { rows, labels, groups }).unwrap();
    service.publish_model(ranker);
    service
}

#[test]
fn service_ranks_strong_candidates_first() {
    let service = trained_service();
    let request = RankRequest {
        job_requirement: "Python FastAPI PostgreSQL Docker".into(),
        job_description: "Backend role. Nice to have AWS.".into(),
        candidates: five_resumes()
            .into_iter()
            .map(|(cv_id, resume_text)| Candidate {
                cv_id: Some(cv_id),
                resume_text,
            })
            .collect(),
        topk: Some(3),
    };

    let ranked = service.rank(&request).unwrap();
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].cv_id, "cv-full");
    assert!(ranked.iter().all(|r| r.cv_id != "cv-java"));
    assert!(ranked.windows(2).all(|w| w[0].pred >= w[1].pred));
}

#[test]
fn single_candidate_request_returns_empty() {
    let service = trained_service();
    let request = RankRequest {
        job_requirement: "Python".into(),
        job_description: String::new(),
        candidates: vec![Candidate {
            cv_id: None,
            resume_text: "Python developer".into(),
        }],
        topk: None,
    };
    assert!(service.rank(&request).unwrap().is_empty());
}

#[test]
fn missing_ids_are_derived_and_idempotent() {
    let service = trained_service();
    let make_request = || RankRequest {
        job_requirement: "Python Docker".into(),
        job_description: String::new(),
        candidates: vec![
            Candidate {
                cv_id: None,
                resume_text: "Python and Docker daily".into(),
            },
            Candidate {
                cv_id: None,
                resume_text: "Java only".into(),
            },
        ],
        topk: None,
    };

    let first = service.score(&make_request()).unwrap();
    let second = service.score(&make_request()).unwrap();
    assert_eq!(first[0].cv_id, second[0].cv_id);
    assert!(first[0].cv_id.starts_with("cv-"));
    assert_eq!(first[0].cv_id.len(), "cv-".len() + 12);
}

#[test]
fn upsert_then_shortlist_finds_the_resume() {
    use cvrank_ann::{AnnStore, IndexKind};
    use cvrank_core::traits::Embedder;

    let dir = tempfile::tempdir().unwrap();
    let embedder = HashingEmbedder::default();
    let seed = embedder
        .embed_batch(&["seed resume about Java".to_string()])
        .unwrap();
    let ann = AnnStore::new(dir.path(), IndexKind::Flat);
    ann.build(vec!["cv-seed".into()], seed).unwrap();

    let service = MatchService::new(Some(Box::new(HashingEmbedder::default()))).with_ann(ann);
    let text = "Python FastAPI PostgreSQL Docker engineer";
    let id = service.upsert_resume(None, text).unwrap();
    assert!(id.starts_with("cv-"));

    // The query text equals the stored resume, so it must come back first.
    let hits = service.shortlist(text, 2).unwrap();
    assert_eq!(hits[0].0, id);
    assert!((hits[0].1 - 1.0).abs() < 1e-5);
}

#[test]
fn upsert_without_index_is_rejected() {
    let service = MatchService::new(Some(Box::new(HashingEmbedder::default())));
    assert!(matches!(
        service.upsert_resume(None, "text").unwrap_err(),
        Error::IndexNotLoaded
    ));
}

#[test]
fn rank_without_model_is_not_ready() {
    let service = MatchService::new(None).with_extractor(exact_only());
    service.load_vocabulary(vocab()).unwrap();
    let request = RankRequest {
        job_requirement: "Python".into(),
        job_description: String::new(),
        candidates: vec![
            Candidate {
                cv_id: Some("a".into()),
                resume_text: "Python".into(),
            },
            Candidate {
                cv_id: Some("b".into()),
                resume_text: "Java".into(),
            },
        ],
        topk: None,
    };
    assert!(matches!(
        service.rank(&request).unwrap_err(),
        Error::ModelNotReady
    ));
}
