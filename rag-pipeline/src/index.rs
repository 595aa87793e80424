use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use common::{error::AppError, utils::embedding::EmbeddingProvider};
use tokio::sync::OnceCell;
use tracing::{info, instrument};

use crate::{scoring, RetrievedChunk};

/// Chunks embedded per provider call while building the matrix.
const EMBED_BATCH_SIZE: usize = 64;

/// The corpus and its embedding matrix, row i belonging to chunk i.
/// Immutable once constructed; requests read it without synchronization.
#[derive(Debug)]
pub struct CorpusIndex {
    chunks: Vec<String>,
    matrix: Vec<Vec<f32>>,
}

impl CorpusIndex {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Vector width of the matrix rows.
    pub fn dimension(&self) -> usize {
        self.matrix.first().map_or(0, Vec::len)
    }

    /// Ranks every chunk against the query vector and returns the shortlist,
    /// best first. The query vector must match the matrix dimension.
    pub fn retrieve(&self, query_vector: &[f32]) -> Result<Vec<RetrievedChunk>, AppError> {
        let expected = self.dimension();
        if query_vector.len() != expected {
            return Err(AppError::Index(format!(
                "query vector has {} dimensions but the index holds {expected}-dimensional rows",
                query_vector.len()
            )));
        }

        let shortlist =
            scoring::top_shortlist(query_vector, &self.matrix, scoring::SHORTLIST_SIZE);

        Ok(shortlist
            .into_iter()
            .filter_map(|(index, score)| {
                self.chunks.get(index).map(|text| RetrievedChunk {
                    index,
                    text: text.clone(),
                    score,
                })
            })
            .collect())
    }
}

/// What to do with a persisted embedding artifact, decided purely from the
/// corpus length and the artifact's shape. A stale artifact is an error
/// instead of a variant: serving or silently re-embedding a matrix that no
/// longer matches the corpus hides operator mistakes, so the mismatch is
/// reported and the operator deletes the artifact to force a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPlan {
    /// Artifact rows map 1:1 onto the corpus; load it and skip embedding.
    ReuseArtifact,
    /// No artifact present; embed the corpus and persist the result.
    BuildAndPersist,
}

pub fn plan_index_load(
    corpus_len: usize,
    artifact_shape: Option<(usize, usize)>,
    expected_dimension: usize,
) -> Result<IndexPlan, AppError> {
    match artifact_shape {
        None => Ok(IndexPlan::BuildAndPersist),
        Some((rows, _)) if rows != corpus_len => Err(AppError::Index(format!(
            "embedding artifact holds {rows} rows but the corpus has {corpus_len} chunks; \
             delete the artifact to re-embed"
        ))),
        Some((_, width)) if width != expected_dimension => Err(AppError::Index(format!(
            "embedding artifact rows are {width}-dimensional but the embedding provider \
             produces {expected_dimension} dimensions; delete the artifact to re-embed"
        ))),
        Some(_) => Ok(IndexPlan::ReuseArtifact),
    }
}

/// Lazily-initialized owner of the [`CorpusIndex`]. The first request to
/// call [`IndexStore::ensure_ready`] performs the load or build; concurrent
/// callers await that same initialization and then share the result. A
/// failed initialization leaves the cell empty, so the next request retries
/// and reports the same error until the cause is fixed.
pub struct IndexStore {
    corpus_path: PathBuf,
    artifact_path: PathBuf,
    provider: Arc<EmbeddingProvider>,
    cell: OnceCell<CorpusIndex>,
    builds: AtomicUsize,
}

impl IndexStore {
    pub fn new(
        corpus_path: impl Into<PathBuf>,
        artifact_path: impl Into<PathBuf>,
        provider: Arc<EmbeddingProvider>,
    ) -> Self {
        Self {
            corpus_path: corpus_path.into(),
            artifact_path: artifact_path.into(),
            provider,
            cell: OnceCell::new(),
            builds: AtomicUsize::new(0),
        }
    }

    pub async fn ensure_ready(&self) -> Result<&CorpusIndex, AppError> {
        self.cell.get_or_try_init(|| self.load_or_build()).await
    }

    /// Number of times the embedding matrix was actually computed. Stays at
    /// zero when a persisted artifact is reused.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    #[instrument(skip_all)]
    async fn load_or_build(&self) -> Result<CorpusIndex, AppError> {
        let chunks = read_corpus(&self.corpus_path).await?;
        let artifact = read_artifact(&self.artifact_path).await?;

        let plan = plan_index_load(
            chunks.len(),
            artifact.as_ref().map(|matrix| matrix_shape(matrix)),
            self.provider.dimension(),
        )?;

        match plan {
            IndexPlan::ReuseArtifact => {
                let matrix = artifact.ok_or_else(|| {
                    AppError::Index("embedding artifact vanished during initialization".to_string())
                })?;
                info!(
                    chunks = chunks.len(),
                    dimension = matrix.first().map_or(0, Vec::len),
                    path = %self.artifact_path.display(),
                    "Loaded embedding artifact; skipping embedding"
                );
                Ok(CorpusIndex { chunks, matrix })
            }
            IndexPlan::BuildAndPersist => {
                self.builds.fetch_add(1, Ordering::Relaxed);
                info!(
                    chunks = chunks.len(),
                    backend = self.provider.backend_label(),
                    "No embedding artifact found; embedding corpus"
                );

                let mut matrix = Vec::with_capacity(chunks.len());
                for batch in chunks.chunks(EMBED_BATCH_SIZE) {
                    let vectors = self.provider.embed_batch(batch).await?;
                    matrix.extend(vectors);
                }

                if matrix.len() != chunks.len() {
                    return Err(AppError::Index(format!(
                        "embedding produced {} vectors for {} chunks",
                        matrix.len(),
                        chunks.len()
                    )));
                }

                write_artifact(&self.artifact_path, &matrix).await?;
                info!(
                    rows = matrix.len(),
                    path = %self.artifact_path.display(),
                    "Persisted embedding artifact"
                );
                Ok(CorpusIndex { chunks, matrix })
            }
        }
    }
}

fn matrix_shape(matrix: &[Vec<f32>]) -> (usize, usize) {
    (matrix.len(), matrix.first().map_or(0, Vec::len))
}

async fn read_corpus(path: &Path) -> Result<Vec<String>, AppError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
        AppError::Corpus(format!("cannot read corpus file {}: {err}", path.display()))
    })?;

    let chunks: Vec<String> = serde_json::from_str(&raw).map_err(|err| {
        AppError::Corpus(format!(
            "corpus file {} is not a JSON array of strings: {err}",
            path.display()
        ))
    })?;

    if chunks.is_empty() {
        return Err(AppError::Corpus(format!(
            "corpus file {} contains no chunks",
            path.display()
        )));
    }

    Ok(chunks)
}

/// Reads the persisted matrix if one exists. A present-but-unreadable or
/// ragged artifact is an error, consistent with the staleness policy above.
async fn read_artifact(path: &Path) -> Result<Option<Vec<Vec<f32>>>, AppError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let matrix: Vec<Vec<f32>> = serde_json::from_str(&raw).map_err(|err| {
        AppError::Index(format!(
            "embedding artifact {} is unreadable: {err}; delete it to re-embed",
            path.display()
        ))
    })?;

    if let Some(width) = matrix.first().map(Vec::len) {
        if matrix.iter().any(|row| row.len() != width) {
            return Err(AppError::Index(format!(
                "embedding artifact {} has ragged rows; delete it to re-embed",
                path.display()
            )));
        }
    }

    Ok(Some(matrix))
}

async fn write_artifact(path: &Path, matrix: &[Vec<f32>]) -> Result<(), AppError> {
    let encoded = serde_json::to_string(matrix)?;
    tokio::fs::write(path, encoded).await?;
    Ok(())
}
