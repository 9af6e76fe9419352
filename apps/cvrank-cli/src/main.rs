use std::collections::HashMap;
use std::path::PathBuf;
use std::{env, fs};

use anyhow::{bail, Context};
use cvrank_ann::{AnnStore, HnswParams, IndexKind};
use cvrank_core::config::Config;
use cvrank_core::{Candidate, FeatureVector, RankRequest};
use cvrank_embed::get_default_embedder;
use cvrank_match::MatchService;
use cvrank_rank::{encode_labels, Dataset, Ranker, RankerParams, RawLabel};
use cvrank_text::SkillVocabulary;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

const USAGE: &str = "Usage: cvrank <command> [args]

Commands:
  vocab-check <path>                      validate a vocabulary file or directory
  train <rows.jsonl> <model-dir>          train the ranking model from labeled feature rows
  rank <request.json>                     rank a request against vocab + model from config
  ann-build <resumes.jsonl> <index-dir>   embed resumes and build the ANN index
      [--kind flat|hnsw]
  ann-search <index-dir> <query> [-k N]   query the ANN index with embedded text";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };

    match command.as_str() {
        "vocab-check" => vocab_check(&args[1..]),
        "train" => train(&args[1..]),
        "rank" => rank(&args[1..]),
        "ann-build" => ann_build(&args[1..]),
        "ann-search" => ann_search(&args[1..]),
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(1);
        }
    }
}

fn vocab_check(args: &[String]) -> anyhow::Result<()> {
    let Some(path) = args.first() else {
        bail!("vocab-check needs a path");
    };
    let vocab = SkillVocabulary::load(&PathBuf::from(path))?;
    let aliases: usize = vocab.skills.iter().map(|s| s.aliases.len()).sum();
    println!("✅ Vocabulary OK: {} skills, {} aliases", vocab.len(), aliases);
    for skill in vocab.skills.iter().take(5) {
        println!("   {} ({} aliases)", skill.canonical, skill.aliases.len());
    }
    if vocab.len() > 5 {
        println!("   … and {} more", vocab.len() - 5);
    }
    Ok(())
}

#[derive(Deserialize)]
struct TrainRow {
    #[serde(flatten)]
    features: FeatureVector,
    label: RawLabel,
}

fn train(args: &[String]) -> anyhow::Result<()> {
    let (Some(rows_path), Some(model_dir)) = (args.first(), args.get(1)) else {
        bail!("train needs <rows.jsonl> <model-dir>");
    };
    let config = Config::load()?;

    let raw = fs::read_to_string(rows_path)
        .with_context(|| format!("reading training rows from {rows_path}"))?;
    let mut vectors = Vec::new();
    let mut labels = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: TrainRow = serde_json::from_str(line)
            .with_context(|| format!("{rows_path}:{} is not a valid training row", lineno + 1))?;
        vectors.push(row.features);
        labels.push(row.label);
    }
    println!("Loaded {} training rows", vectors.len());

    let label_map: Option<HashMap<String, i64>> = config.get("train.label_map").ok();
    let encoded = encode_labels(&labels, label_map.as_ref())?;
    let dataset = Dataset::from_feature_vectors(&vectors, encoded);

    let params = RankerParams {
        n_trees: config.get_or("train.n_trees", 120),
        learning_rate: config.get_or("train.learning_rate", 0.1),
        max_depth: config.get_or("train.max_depth", 4),
        seed: config.get_or("train.seed", 42),
        validation_fraction: config.get_or("train.validation_fraction", 0.2),
        ..Default::default()
    };
    let mut ranker = Ranker::new(params);
    ranker.set_label_map(label_map);
    let report = ranker.fit(dataset)?;
    println!(
        "📊 Trained on {} groups ({} held out): NDCG@5 {:.4}, NDCG@10 {:.4}, spearman {:.4}",
        report.train_groups,
        report.valid_groups,
        report.ndcg_at_5,
        report.ndcg_at_10,
        report.spearman
    );

    let model_dir = PathBuf::from(model_dir);
    ranker.save(&model_dir)?;
    println!("✅ Model saved to {}", model_dir.display());
    Ok(())
}

fn rank(args: &[String]) -> anyhow::Result<()> {
    let Some(request_path) = args.first() else {
        bail!("rank needs <request.json>");
    };
    let config = Config::load()?;
    let vocab_path: String = config.get_or("vocab.path", "./skills".to_string());
    let model_dir: String = config.get_or("model.dir", "./model".to_string());

    let embedder = match get_default_embedder() {
        Ok(e) => Some(e),
        Err(e) => {
            eprintln!("⚠️  No embedding provider ({e}); ranking without semantic features");
            None
        }
    };

    let service = MatchService::new(embedder);
    service.load_vocabulary(SkillVocabulary::load(&PathBuf::from(&vocab_path))?)?;
    service.reload_model(&PathBuf::from(&model_dir))?;

    let raw = fs::read_to_string(request_path)
        .with_context(|| format!("reading request from {request_path}"))?;
    let request: RankRequest = serde_json::from_str(&raw)?;
    let ranked = service.rank(&request)?;

    if ranked.is_empty() {
        println!("No ranking produced (fewer than two candidates?)");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&ranked)?);
    Ok(())
}

fn ann_build(args: &[String]) -> anyhow::Result<()> {
    let (Some(resumes_path), Some(index_dir)) = (args.first(), args.get(1)) else {
        bail!("ann-build needs <resumes.jsonl> <index-dir>");
    };
    let kind = match args.iter().position(|a| a == "--kind") {
        Some(i) => match args.get(i + 1).map(String::as_str) {
            Some("flat") => IndexKind::Flat,
            Some("hnsw") | None => IndexKind::Hnsw,
            Some(other) => bail!("unknown index kind {other:?}"),
        },
        None => IndexKind::Hnsw,
    };

    let raw = fs::read_to_string(resumes_path)
        .with_context(|| format!("reading resumes from {resumes_path}"))?;
    let mut ids = Vec::new();
    let mut texts = Vec::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let candidate: Candidate = serde_json::from_str(line)?;
        ids.push(
            candidate
                .cv_id
                .unwrap_or_else(|| cvrank_core::stable_hash_id(&candidate.resume_text, "cv-")),
        );
        texts.push(candidate.resume_text);
    }
    if texts.is_empty() {
        bail!("no resumes found in {resumes_path}");
    }
    println!("Embedding {} resumes…", texts.len());

    let embedder = get_default_embedder()?;
    let bar = ProgressBar::new(texts.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40} {pos}/{len} {elapsed_precise}",
    )?);
    let mut vectors = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(64) {
        vectors.extend(embedder.embed_batch(chunk)?);
        bar.inc(chunk.len() as u64);
    }
    bar.finish();

    let store = AnnStore::new(PathBuf::from(index_dir), kind)
        .with_hnsw_params(HnswParams::default());
    store.build(ids, vectors)?;
    println!("✅ Built {} index with {} resumes at {}", kind_name(kind), store.len(), index_dir);
    Ok(())
}

fn ann_search(args: &[String]) -> anyhow::Result<()> {
    let (Some(index_dir), Some(query)) = (args.first(), args.get(1)) else {
        bail!("ann-search needs <index-dir> <query>");
    };
    let k = match args.iter().position(|a| a == "-k") {
        Some(i) => args
            .get(i + 1)
            .and_then(|v| v.parse::<usize>().ok())
            .context("-k requires a number")?,
        None => 10,
    };

    // Kind recorded in meta.json; both kinds deserialize from the same
    // payload, so the flag here only matters for fresh builds.
    let store = AnnStore::new(PathBuf::from(index_dir), IndexKind::Hnsw);
    store.load()?;

    let embedder = get_default_embedder()?;
    let query_vec = embedder.embed_batch(std::slice::from_ref(query))?;
    let hits = store.search(&query_vec, k)?;

    for (rank, (id, sim)) in hits[0].iter().enumerate() {
        println!("{:>2}. {:<20} {:.4}", rank + 1, id, sim);
    }
    Ok(())
}

fn kind_name(kind: IndexKind) -> &'static str {
    match kind {
        IndexKind::Flat => "flat",
        IndexKind::Hnsw => "hnsw",
    }
}
