use async_trait::async_trait;
use common::{error::AppError, utils::config::AppConfig};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{RankedChunk, RetrievedChunk};

/// External relevance-scoring capability. Implementations pick and order the
/// returned subset themselves; the pipeline never re-sorts what comes back.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, AppError>;
}

/// One selected candidate: an index into the submitted document list plus
/// the relevance score the service assigned it.
#[derive(Debug, Clone, Deserialize)]
pub struct RerankHit {
    pub index: usize,
    pub relevance_score: f32,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankHit>,
}

/// Client for a Cohere-style `POST {base}/rerank` endpoint.
pub struct HttpReranker {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpReranker {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            model: model.to_owned(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.rerank_base_url,
            &config.rerank_api_key,
            &config.rerank_model,
        )
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, AppError> {
        let url = format!("{}/rerank", self.base_url);
        let body = json!({
            "model": self.model,
            "query": query,
            "documents": documents,
            "top_n": top_n,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Rerank(format!(
                "rerank endpoint returned {status}: {detail}"
            )));
        }

        let parsed: RerankResponse = response.json().await?;
        Ok(parsed.results)
    }
}

/// Sends the shortlist texts to the reranker and resolves the returned
/// indices back to corpus chunks, preserving the service ordering and
/// attaching 1-based ranks. `top_n` is capped at the candidate count, and an
/// empty shortlist returns empty without touching the service.
pub async fn rerank_shortlist(
    reranker: &dyn Reranker,
    query: &str,
    shortlist: &[RetrievedChunk],
    top_n: usize,
) -> Result<Vec<RankedChunk>, AppError> {
    let limit = top_n.min(shortlist.len());
    if limit == 0 {
        return Ok(Vec::new());
    }

    let documents: Vec<String> = shortlist.iter().map(|c| c.text.clone()).collect();
    let hits = reranker.rerank(query, &documents, limit).await?;

    debug!(requested = limit, returned = hits.len(), "Reranker responded");

    hits.into_iter()
        .enumerate()
        .map(|(position, hit)| {
            let candidate = shortlist.get(hit.index).ok_or_else(|| {
                AppError::Rerank(format!(
                    "reranker referenced candidate {} but only {} were submitted",
                    hit.index,
                    shortlist.len()
                ))
            })?;
            Ok(RankedChunk {
                index: candidate.index,
                text: candidate.text.clone(),
                relevance: hit.relevance_score,
                rank: position + 1,
            })
        })
        .collect()
}

/// Keeps candidates in submitted order with synthetic descending scores.
/// Stands in for the live service in tests.
#[cfg(any(test, feature = "test-utils"))]
pub struct PassthroughReranker;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Reranker for PassthroughReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, AppError> {
        Ok((0..documents.len().min(top_n))
            .map(|index| RerankHit {
                index,
                relevance_score: 1.0 - index as f32 * 0.1,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shortlist(texts: &[(usize, &str)]) -> Vec<RetrievedChunk> {
        texts
            .iter()
            .map(|(index, text)| RetrievedChunk {
                index: *index,
                text: (*text).to_owned(),
                score: 0.9,
            })
            .collect()
    }

    /// Records the `top_n` it receives so tests can observe the clamp.
    struct RecordingReranker {
        seen_top_n: AtomicUsize,
        calls: AtomicUsize,
    }

    impl RecordingReranker {
        fn new() -> Self {
            Self {
                seen_top_n: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Reranker for RecordingReranker {
        async fn rerank(
            &self,
            _query: &str,
            documents: &[String],
            top_n: usize,
        ) -> Result<Vec<RerankHit>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_top_n.store(top_n, Ordering::SeqCst);
            Ok((0..documents.len().min(top_n))
                .map(|index| RerankHit {
                    index,
                    relevance_score: 0.5,
                })
                .collect())
        }
    }

    struct ScriptedReranker {
        hits: Vec<RerankHit>,
    }

    #[async_trait]
    impl Reranker for ScriptedReranker {
        async fn rerank(
            &self,
            _query: &str,
            _documents: &[String],
            _top_n: usize,
        ) -> Result<Vec<RerankHit>, AppError> {
            Ok(self.hits.clone())
        }
    }

    struct FailingReranker;

    #[async_trait]
    impl Reranker for FailingReranker {
        async fn rerank(
            &self,
            _query: &str,
            _documents: &[String],
            _top_n: usize,
        ) -> Result<Vec<RerankHit>, AppError> {
            Err(AppError::Rerank("rerank endpoint returned 503".to_owned()))
        }
    }

    #[tokio::test]
    async fn over_asking_is_clamped_to_the_candidate_count() {
        let reranker = RecordingReranker::new();
        let candidates = shortlist(&[(0, "a"), (1, "b")]);

        let ranked = rerank_shortlist(&reranker, "q", &candidates, 10)
            .await
            .expect("rerank");

        assert_eq!(reranker.seen_top_n.load(Ordering::SeqCst), 2);
        assert_eq!(ranked.len(), 2);
    }

    #[tokio::test]
    async fn empty_shortlist_skips_the_service() {
        let reranker = RecordingReranker::new();

        let ranked = rerank_shortlist(&reranker, "q", &[], 3).await.expect("rerank");

        assert!(ranked.is_empty());
        assert_eq!(reranker.calls.load(Ordering::SeqCst), 0, "no call expected");
    }

    #[tokio::test]
    async fn zero_top_n_short_circuits() {
        let reranker = RecordingReranker::new();
        let candidates = shortlist(&[(0, "a")]);

        let ranked = rerank_shortlist(&reranker, "q", &candidates, 0)
            .await
            .expect("rerank");

        assert!(ranked.is_empty());
        assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn service_order_is_preserved_and_indices_resolved() {
        let reranker = ScriptedReranker {
            hits: vec![
                RerankHit {
                    index: 1,
                    relevance_score: 0.32,
                },
                RerankHit {
                    index: 0,
                    relevance_score: 0.97,
                },
            ],
        };
        let candidates = shortlist(&[(7, "seventh chunk"), (3, "third chunk")]);

        let ranked = rerank_shortlist(&reranker, "q", &candidates, 2)
            .await
            .expect("rerank");

        // Ascending relevance coming back must stay ascending: the service
        // owns the ordering.
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].index, 3);
        assert_eq!(ranked[0].rank, 1);
        assert!((ranked[0].relevance - 0.32).abs() < 1e-6);
        assert_eq!(ranked[1].index, 7);
        assert_eq!(ranked[1].rank, 2);
        assert!((ranked[1].relevance - 0.97).abs() < 1e-6);
    }

    #[tokio::test]
    async fn out_of_range_index_is_a_contract_error() {
        let reranker = ScriptedReranker {
            hits: vec![RerankHit {
                index: 5,
                relevance_score: 0.9,
            }],
        };
        let candidates = shortlist(&[(0, "only one")]);

        let err = rerank_shortlist(&reranker, "q", &candidates, 1)
            .await
            .expect_err("index out of range");
        assert!(matches!(err, AppError::Rerank(_)), "got {err}");
    }

    #[tokio::test]
    async fn service_failures_propagate_unchanged() {
        let candidates = shortlist(&[(0, "a"), (1, "b")]);

        let err = rerank_shortlist(&FailingReranker, "q", &candidates, 2)
            .await
            .expect_err("failure must propagate");
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn passthrough_keeps_submission_order() {
        let candidates = shortlist(&[(4, "x"), (9, "y"), (2, "z")]);

        let ranked = rerank_shortlist(&PassthroughReranker, "q", &candidates, 2)
            .await
            .expect("rerank");

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].index, 4);
        assert_eq!(ranked[1].index, 9);
        assert!(ranked[0].relevance > ranked[1].relevance);
    }
}
