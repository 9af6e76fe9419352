//! Persistent index store.
//!
//! On disk an index directory holds three files:
//!
//! - `index.bin`  — bincode-encoded backend with a CRC32 footer
//! - `ids.jsonl`  — one JSON-encoded external id per line, insertion order
//! - `meta.json`  — dim, count, metric, kind, created_at
//!
//! Writes go to a temp file in the same directory and are renamed into
//! place, so a crash mid-write leaves the previous index intact. Readers
//! search a published snapshot without locking; `build` and `add` are
//! serialized behind a single writer mutex.

use crate::flat::FlatIndex;
use crate::hnsw::{HnswIndex, HnswParams};
use cvrank_core::traits::l2_normalize;
use cvrank_core::{Error, Result, SwapCell};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const INDEX_FILE: &str = "index.bin";
const IDS_FILE: &str = "ids.jsonl";
const META_FILE: &str = "meta.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Flat,
    Hnsw,
}

impl IndexKind {
    fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Flat => "flat",
            IndexKind::Hnsw => "hnsw",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Backend {
    Flat(FlatIndex),
    Hnsw(HnswIndex),
}

impl Backend {
    fn kind(&self) -> IndexKind {
        match self {
            Backend::Flat(_) => IndexKind::Flat,
            Backend::Hnsw(_) => IndexKind::Hnsw,
        }
    }

    fn dim(&self) -> usize {
        match self {
            Backend::Flat(f) => f.dim,
            Backend::Hnsw(h) => h.dim,
        }
    }

    fn len(&self) -> usize {
        match self {
            Backend::Flat(f) => f.len(),
            Backend::Hnsw(h) => h.len(),
        }
    }

    fn push(&mut self, vector: &[f32]) {
        match self {
            Backend::Flat(f) => f.push(vector),
            Backend::Hnsw(h) => {
                h.insert(vector);
            }
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(u32, f32)> {
        match self {
            Backend::Flat(f) => f.search(query, k),
            Backend::Hnsw(h) => h.search(query, k),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexMeta {
    dim: usize,
    count: usize,
    metric: String,
    kind: String,
    created_at: String,
}

struct Snapshot {
    backend: Backend,
    ids: Vec<String>,
}

/// Persistent ANN store over one index directory.
pub struct AnnStore {
    dir: PathBuf,
    kind: IndexKind,
    hnsw_params: HnswParams,
    snapshot: SwapCell<Snapshot>,
    writer: Mutex<()>,
}

impl AnnStore {
    pub fn new(dir: impl Into<PathBuf>, kind: IndexKind) -> Self {
        Self {
            dir: dir.into(),
            kind,
            hnsw_params: HnswParams::default(),
            snapshot: SwapCell::empty(),
            writer: Mutex::new(()),
        }
    }

    pub fn with_hnsw_params(mut self, params: HnswParams) -> Self {
        self.hnsw_params = params;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.is_published()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().map_or(0, |s| s.backend.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a fresh index from scratch and persists it.
    pub fn build(&self, ids: Vec<String>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if ids.len() != vectors.len() {
            return Err(Error::Config(format!(
                "id/vector count mismatch: {} ids, {} vectors",
                ids.len(),
                vectors.len()
            )));
        }
        if vectors.is_empty() {
            return Err(Error::Config("cannot build an empty index".into()));
        }
        let dim = vectors[0].len();
        let _guard = self.writer.lock();

        let mut backend = match self.kind {
            IndexKind::Flat => Backend::Flat(FlatIndex::new(dim)),
            IndexKind::Hnsw => Backend::Hnsw(HnswIndex::new(dim, self.hnsw_params)),
        };
        for (i, mut v) in vectors.into_iter().enumerate() {
            if v.len() != dim {
                return Err(Error::Config(format!(
                    "vector {} has dim {}, expected {}",
                    i,
                    v.len(),
                    dim
                )));
            }
            l2_normalize(&mut v);
            backend.push(&v);
        }

        let snapshot = Snapshot { backend, ids };
        self.persist(&snapshot)?;
        info!(
            kind = self.kind.as_str(),
            count = snapshot.ids.len(),
            dim,
            "built ann index"
        );
        self.snapshot.publish(snapshot);
        Ok(())
    }

    /// Appends vectors to the current index and re-persists it.
    pub fn add(&self, ids: Vec<String>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if ids.len() != vectors.len() {
            return Err(Error::Config(format!(
                "id/vector count mismatch: {} ids, {} vectors",
                ids.len(),
                vectors.len()
            )));
        }
        let _guard = self.writer.lock();
        let current = self.snapshot.load().ok_or(Error::IndexNotLoaded)?;
        let dim = current.backend.dim();

        let mut backend = current.backend.clone();
        let mut all_ids = current.ids.clone();
        for (i, (id, mut v)) in ids.into_iter().zip(vectors).enumerate() {
            if v.len() != dim {
                return Err(Error::Config(format!(
                    "vector {} has dim {}, expected {}",
                    i,
                    v.len(),
                    dim
                )));
            }
            l2_normalize(&mut v);
            backend.push(&v);
            all_ids.push(id);
        }

        let snapshot = Snapshot {
            backend,
            ids: all_ids,
        };
        self.persist(&snapshot)?;
        self.snapshot.publish(snapshot);
        Ok(())
    }

    /// Restores the index and id map from disk.
    pub fn load(&self) -> Result<()> {
        let _guard = self.writer.lock();
        let backend = read_backend(&self.dir.join(INDEX_FILE))?;
        let ids = read_ids(&self.dir.join(IDS_FILE))?;
        if ids.len() != backend.len() {
            return Err(Error::IndexCorrupted(format!(
                "{} ids but {} vectors",
                ids.len(),
                backend.len()
            )));
        }
        info!(
            kind = backend.kind().as_str(),
            count = ids.len(),
            dir = %self.dir.display(),
            "loaded ann index"
        );
        self.snapshot.publish(Snapshot { backend, ids });
        Ok(())
    }

    /// Top-k per query, `(external_id, cosine_similarity)` descending.
    /// Never pads: a query gets fewer than `k` hits when the index is
    /// smaller than `k`.
    pub fn search(&self, queries: &[Vec<f32>], k: usize) -> Result<Vec<Vec<(String, f32)>>> {
        let snapshot = self.snapshot.load().ok_or(Error::IndexNotLoaded)?;
        let dim = snapshot.backend.dim();
        let mut out = Vec::with_capacity(queries.len());
        for q in queries {
            if q.len() != dim {
                return Err(Error::Config(format!(
                    "query has dim {}, expected {}",
                    q.len(),
                    dim
                )));
            }
            let mut q = q.clone();
            l2_normalize(&mut q);
            let hits = snapshot
                .backend
                .search(&q, k)
                .into_iter()
                .map(|(internal, sim)| (snapshot.ids[internal as usize].clone(), sim))
                .collect();
            out.push(hits);
        }
        Ok(out)
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        write_backend(&self.dir.join(INDEX_FILE), &snapshot.backend)?;
        write_ids(&self.dir.join(IDS_FILE), &snapshot.ids)?;

        let meta = IndexMeta {
            dim: snapshot.backend.dim(),
            count: snapshot.ids.len(),
            metric: "cosine".into(),
            kind: snapshot.backend.kind().as_str().into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        atomic_write(&self.dir.join(META_FILE), serde_json::to_vec_pretty(&meta)?)
    }
}

fn write_backend(path: &Path, backend: &Backend) -> Result<()> {
    let payload = bincode::serialize(backend)
        .map_err(|e| Error::IndexCorrupted(format!("encode failed: {e}")))?;
    let crc = crc32fast::hash(&payload);
    let mut bytes = payload;
    bytes.extend_from_slice(&crc.to_le_bytes());
    atomic_write(path, bytes)
}

fn read_backend(path: &Path) -> Result<Backend> {
    let bytes = fs::read(path)?;
    if bytes.len() < 4 {
        return Err(Error::IndexCorrupted("index file truncated".into()));
    }
    let (payload, footer) = bytes.split_at(bytes.len() - 4);
    let stored = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
    let actual = crc32fast::hash(payload);
    if stored != actual {
        return Err(Error::IndexCorrupted(format!(
            "checksum mismatch: stored {stored:#010x}, computed {actual:#010x}"
        )));
    }
    bincode::deserialize(payload).map_err(|e| Error::IndexCorrupted(format!("decode failed: {e}")))
}

fn write_ids(path: &Path, ids: &[String]) -> Result<()> {
    let mut buf = Vec::with_capacity(ids.len() * 16);
    for id in ids {
        serde_json::to_writer(&mut buf, id)?;
        buf.push(b'\n');
    }
    atomic_write(path, buf)
}

fn read_ids(path: &Path) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut ids = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        ids.push(serde_json::from_str(&line)?);
    }
    Ok(ids)
}

/// Same-directory temp file plus rename, so the target is replaced whole.
fn atomic_write(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut f = File::create(&tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_before_load_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnnStore::new(dir.path(), IndexKind::Flat);
        let err = store.search(&[vec![1.0, 0.0]], 3).unwrap_err();
        assert!(matches!(err, Error::IndexNotLoaded));
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnnStore::new(dir.path(), IndexKind::Flat);
        store
            .build(vec!["a".into()], vec![vec![1.0, 0.0]])
            .unwrap();

        let path = dir.path().join(INDEX_FILE);
        let mut bytes = fs::read(&path).unwrap();
        bytes[0] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let fresh = AnnStore::new(dir.path(), IndexKind::Flat);
        let err = fresh.load().unwrap_err();
        assert!(matches!(err, Error::IndexCorrupted(_)));
    }
}
