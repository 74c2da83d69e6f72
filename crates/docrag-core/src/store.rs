//! Persistent flat vector index for chunk embeddings, paired 1:1 with chunk metadata.
//!
//! A store directory holds two artifacts that are always written together:
//! `index.bin` (the vectors) and `meta.json` (one [ChunkMeta] per vector, same order).
//! Vectors are appended in insertion order and never updated or removed.
//! Search is exact (brute force) inner product over unit-length vectors.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const INDEX_FILENAME: &str = "index.bin";
pub const META_FILENAME: &str = "meta.json";
/// Previous metadata, kept only while a commit is in progress.
pub const META_BACKUP_FILENAME: &str = "meta.json.bak";

/// Largest `k` accepted by [VectorIndex::search]; every slot is allocated up front.
pub const MAX_K: usize = 10_000;

/// Score given to padding slots when the index holds fewer than `k` vectors.
/// Lower than any real similarity, so ranking stays "larger is better".
pub const PADDING_SCORE: f32 = f32::MIN;

const MAGIC: &[u8; 4] = b"DRIX";
const FORMAT_VERSION: u32 = 1;

/// What we know about the text behind a stored vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub doc_id: String,
    pub text: String,
}

/// One ranked search slot. `meta` is `None` for padding slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub score: f32,
    pub meta: Option<ChunkMeta>,
}

#[derive(Debug, Clone)]
struct FlatIndex {
    dim: usize,
    /// Row-major, `dim` floats per vector, all unit length (or zero).
    vectors: Vec<f32>,
    metadata: Vec<ChunkMeta>,
}

impl FlatIndex {
    fn empty(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
            metadata: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.metadata.len()
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dim..(i + 1) * self.dim]
    }
}

/// File-backed vector index over one store directory.
///
/// Loaded lazily: nothing is read until [VectorIndex::load] or [VectorIndex::add].
/// Single writer at a time; concurrent writers from other processes are not guarded.
#[derive(Debug)]
pub struct VectorIndex {
    dir: PathBuf,
    state: Option<FlatIndex>,
}

impl VectorIndex {
    /// Open (without loading) the store at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Io(dir.clone(), e))?;
        Ok(Self { dir, state: None })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILENAME)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILENAME)
    }

    fn meta_backup_path(&self) -> PathBuf {
        self.dir.join(META_BACKUP_FILENAME)
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// Dimension of the loaded index, if any.
    pub fn dimension(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.dim)
    }

    /// Number of stored vectors (0 when not loaded).
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, FlatIndex::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (Re)reads index and metadata from disk. If nothing has been persisted yet,
    /// starts a fresh empty index of dimension `dim`. A persisted index keeps its
    /// own dimension regardless of `dim`.
    ///
    /// A commit interrupted between the metadata and index renames leaves a
    /// metadata backup behind; it is resolved here before reading.
    pub fn load(&mut self, dim: usize) -> Result<(), StoreError> {
        let index_path = self.index_path();
        let state = if index_path.exists() {
            let (file_dim, vectors) = read_index(&index_path)?;
            let count = vectors.len() / file_dim;
            self.recover_interrupted_commit(count)?;
            let metadata = read_meta(&self.meta_path())?;
            if count != metadata.len() {
                return Err(StoreError::Corrupt(format!(
                    "{} vectors but {} metadata records",
                    count,
                    metadata.len()
                )));
            }
            debug!(dir = %self.dir.display(), dim = file_dim, count, "loaded vector index");
            FlatIndex {
                dim: file_dim,
                vectors,
                metadata,
            }
        } else {
            debug!(dir = %self.dir.display(), dim, "no persisted index, starting empty");
            FlatIndex::empty(dim)
        };
        self.state = Some(state);
        Ok(())
    }

    /// Keeps whichever metadata file matches the `count` vectors in the index.
    fn recover_interrupted_commit(&self, count: usize) -> Result<(), StoreError> {
        let backup = self.meta_backup_path();
        if !backup.exists() {
            return Ok(());
        }
        let meta_path = self.meta_path();
        let current_matches = meta_path.exists() && read_meta(&meta_path)?.len() == count;
        if current_matches {
            std::fs::remove_file(&backup).map_err(|e| StoreError::Io(backup, e))?;
        } else {
            warn!(dir = %self.dir.display(), "restoring metadata from an interrupted commit");
            std::fs::rename(&backup, &meta_path).map_err(|e| StoreError::Io(meta_path, e))?;
        }
        Ok(())
    }

    /// Appends vectors with their metadata and persists both artifacts before returning.
    ///
    /// Fails without changing anything (in memory or on disk) if the batch is
    /// ragged, disagrees with the index dimension, or cannot be persisted.
    pub fn add(&mut self, vectors: &[Vec<f32>], metadatas: &[ChunkMeta]) -> Result<(), StoreError> {
        if vectors.len() != metadatas.len() {
            return Err(StoreError::LengthMismatch {
                vectors: vectors.len(),
                metadata: metadatas.len(),
            });
        }
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let dim = first.len();
        if dim == 0 {
            return Err(StoreError::ZeroDimension);
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(StoreError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }

        if self.state.is_none() {
            self.load(dim)?;
        }
        let Some(state) = self.state.as_mut() else {
            return Err(StoreError::NotInitialized);
        };
        if state.dim != dim {
            return Err(StoreError::DimensionMismatch {
                expected: state.dim,
                actual: dim,
            });
        }

        let prev_len = state.len();
        for v in vectors {
            state.vectors.extend(normalize(v));
        }
        state.metadata.extend_from_slice(metadatas);

        if let Err(e) = persist(&self.dir, state) {
            state.vectors.truncate(prev_len * dim);
            state.metadata.truncate(prev_len);
            return Err(e);
        }
        debug!(added = vectors.len(), total = state.len(), "persisted vector index");
        Ok(())
    }

    /// Returns exactly `k` slots ranked by similarity, best first. Slots beyond the
    /// number of stored vectors are padding: [PADDING_SCORE] with no metadata.
    /// `k` above [MAX_K] is rejected.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>, StoreError> {
        let state = self.state.as_ref().ok_or(StoreError::NotInitialized)?;
        if k > MAX_K {
            return Err(StoreError::TooManyResults {
                requested: k,
                max: MAX_K,
            });
        }
        if query.len() != state.dim {
            return Err(StoreError::DimensionMismatch {
                expected: state.dim,
                actual: query.len(),
            });
        }
        let q = normalize(query);
        let mut scored: Vec<(usize, f32)> = (0..state.len())
            .map(|i| (i, dot(&q, state.row(i))))
            .collect();
        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut hits: Vec<Hit> = scored
            .into_iter()
            .take(k)
            .map(|(i, score)| Hit {
                score,
                meta: Some(state.metadata[i].clone()),
            })
            .collect();
        hits.resize(
            k,
            Hit {
                score: PADDING_SCORE,
                meta: None,
            },
        );
        Ok(hits)
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Writes both artifacts to temp files, then swaps them in: the old metadata is
/// moved aside, the new metadata and index are renamed into place, and the
/// backup is dropped. On failure the old metadata is put back, so disk never
/// pairs new metadata with an old index.
fn persist(dir: &Path, state: &FlatIndex) -> Result<(), StoreError> {
    let index_path = dir.join(INDEX_FILENAME);
    let meta_path = dir.join(META_FILENAME);
    let backup_path = dir.join(META_BACKUP_FILENAME);
    let index_tmp = dir.join(format!("{INDEX_FILENAME}.tmp"));
    let meta_tmp = dir.join(format!("{META_FILENAME}.tmp"));

    write_index(&index_tmp, state)?;
    let file = File::create(&meta_tmp).map_err(|e| StoreError::Io(meta_tmp.clone(), e))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, &state.metadata).map_err(StoreError::Json)?;
    w.flush().map_err(|e| StoreError::Io(meta_tmp.clone(), e))?;

    let had_meta = meta_path.exists();
    if had_meta {
        std::fs::rename(&meta_path, &backup_path)
            .map_err(|e| StoreError::Io(backup_path.clone(), e))?;
    }
    let committed = std::fs::rename(&meta_tmp, &meta_path)
        .map_err(|e| StoreError::Io(meta_path.clone(), e))
        .and_then(|()| {
            std::fs::rename(&index_tmp, &index_path)
                .map_err(|e| StoreError::Io(index_path.clone(), e))
        });

    if let Err(e) = committed {
        let restored = if had_meta {
            std::fs::rename(&backup_path, &meta_path)
        } else if meta_path.exists() {
            std::fs::remove_file(&meta_path)
        } else {
            Ok(())
        };
        if let Err(re) = restored {
            warn!(dir = %dir.display(), error = %re, "could not restore previous metadata");
        }
        let _ = std::fs::remove_file(&meta_tmp);
        let _ = std::fs::remove_file(&index_tmp);
        return Err(e);
    }
    if had_meta {
        std::fs::remove_file(&backup_path).map_err(|e| StoreError::Io(backup_path, e))?;
    }
    Ok(())
}

fn write_index(path: &Path, state: &FlatIndex) -> Result<(), StoreError> {
    let io = |e| StoreError::Io(path.to_path_buf(), e);
    let file = File::create(path).map_err(io)?;
    let mut w = BufWriter::new(file);
    let dim = u32::try_from(state.dim)
        .map_err(|_| StoreError::Corrupt(format!("dimension {} too large", state.dim)))?;
    w.write_all(MAGIC).map_err(io)?;
    w.write_all(&FORMAT_VERSION.to_le_bytes()).map_err(io)?;
    w.write_all(&dim.to_le_bytes()).map_err(io)?;
    w.write_all(&(state.len() as u64).to_le_bytes()).map_err(io)?;
    for x in &state.vectors {
        w.write_all(&x.to_le_bytes()).map_err(io)?;
    }
    w.flush().map_err(io)
}

fn read_index(path: &Path) -> Result<(usize, Vec<f32>), StoreError> {
    let io = |e| StoreError::Io(path.to_path_buf(), e);
    let file = File::open(path).map_err(io)?;
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(io)?;
    if &magic != MAGIC {
        return Err(StoreError::Corrupt(format!("{} is not an index file", path.display())));
    }
    let mut word = [0u8; 4];
    r.read_exact(&mut word).map_err(io)?;
    let version = u32::from_le_bytes(word);
    if version != FORMAT_VERSION {
        return Err(StoreError::Corrupt(format!("unsupported index version {version}")));
    }
    r.read_exact(&mut word).map_err(io)?;
    let dim = u32::from_le_bytes(word) as usize;
    let mut long = [0u8; 8];
    r.read_exact(&mut long).map_err(io)?;
    let count = u64::from_le_bytes(long) as usize;
    if dim == 0 {
        return Err(StoreError::Corrupt("index header has dimension 0".to_string()));
    }
    let expected_bytes = count
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| {
            StoreError::Corrupt(format!("header size overflows: {count} x {dim}"))
        })?;

    let mut bytes = Vec::new();
    r.read_to_end(&mut bytes).map_err(io)?;
    if bytes.len() != expected_bytes {
        return Err(StoreError::Corrupt(format!(
            "expected {} vectors of dimension {}, found {} bytes",
            count,
            dim,
            bytes.len()
        )));
    }
    let vectors = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((dim, vectors))
}

fn read_meta(path: &Path) -> Result<Vec<ChunkMeta>, StoreError> {
    if !path.exists() {
        return Err(StoreError::Corrupt(format!(
            "index present but {} is missing",
            path.display()
        )));
    }
    let file = File::open(path).map_err(|e| StoreError::Io(path.to_path_buf(), e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(StoreError::Json)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("embedding dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("index not loaded")]
    NotInitialized,
    #[error("embedding vectors must not be empty")]
    ZeroDimension,
    #[error("requested {requested} results, at most {max} allowed")]
    TooManyResults { requested: usize, max: usize },
    #[error("{vectors} vectors but {metadata} metadata records")]
    LengthMismatch { vectors: usize, metadata: usize },
    #[error("corrupt store: {0}")]
    Corrupt(String),
    #[error("io error for {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("metadata json: {0}")]
    Json(serde_json::Error),
}
