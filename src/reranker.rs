use rayon::prelude::*;

use crate::{
    database::VectorIndex,
    error::{Error, Result},
    matcher::{self, Match},
};

/// Re-score top-k candidates against their per-record reranking vectors and
/// keep the `best_k` highest by blended score.
///
/// The blended score is the arithmetic mean of the first-stage similarity and
/// the similarity between the query and the record's reranking vector.
/// Selection uses the same stable top-k rule as the first stage, over the
/// candidate pool only.
///
/// A candidate whose record carries no reranking vector keeps a secondary
/// score of 0.0, which demotes it without failing the query.
pub fn rerank(
    index: &VectorIndex,
    candidates: &[Match],
    query: &[f32],
    best_k: usize,
) -> Result<Vec<Match>> {
    if best_k > candidates.len() {
        return Err(Error::Config(format!(
            "best_k ({best_k}) exceeds the candidate pool ({})",
            candidates.len()
        )));
    }

    let blended: Vec<Match> = candidates
        .par_iter()
        .map(|candidate| -> Result<Match> {
            let secondary = match &index.meta(candidate.index).rerank_embedding {
                Some(rerank) => {
                    if rerank.len() != query.len() {
                        return Err(Error::DimensionMismatch {
                            expected: query.len(),
                            found: rerank.len(),
                        });
                    }
                    matcher::cosine(rerank, query)
                }
                None => {
                    tracing::warn!(
                        index = candidate.index,
                        "candidate record has no reranking vector, scoring it 0.0"
                    );
                    0.0
                }
            };
            Ok(Match {
                index: candidate.index,
                score: (candidate.score + secondary) / 2.0,
            })
        })
        .collect::<Result<_>>()?;

    Ok(matcher::select_top_k(blended, best_k))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;
    use crate::database::Database;

    fn db_fixture() -> (tempfile::TempDir, Database) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("database.json");
        let value = json!({
            // First-stage favourite, but its rerank vector points away.
            "rec-a": {
                "chunks": ["alpha"],
                "embeddings": [[1.0, 0.0]],
                "reranking_embedding": [0.0, 1.0]
            },
            // Slightly behind in stage one, rerank vector matches the query.
            "rec-b": {
                "chunks": ["beta"],
                "embeddings": [[0.9, 0.4358899]],
                "reranking_embedding": [1.0, 0.0]
            },
            "rec-c": {
                "chunks": ["gamma"],
                "embeddings": [[0.0, 1.0]]
            }
        });
        fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        let db = Database::load(&path).unwrap();
        (tmp, db)
    }

    #[test]
    fn blended_score_is_mean_of_both_stages() {
        let (_tmp, db) = db_fixture();
        let query = [1.0, 0.0];
        let candidates = crate::matcher::find_top_k(db.index(), &query, 2).unwrap();

        let reranked = rerank(db.index(), &candidates, &query, 2).unwrap();

        // rec-a: (1.0 + 0.0) / 2 = 0.5; rec-b: (0.9 + 1.0) / 2 = 0.95.
        assert_eq!(reranked[0].index, 1);
        assert!((reranked[0].score - 0.95).abs() < 1e-5);
        assert_eq!(reranked[1].index, 0);
        assert!((reranked[1].score - 0.5).abs() < 1e-5);
    }

    #[test]
    fn rerank_can_overturn_first_stage_order() {
        let (_tmp, db) = db_fixture();
        let query = [1.0, 0.0];
        let candidates = crate::matcher::find_top_k(db.index(), &query, 2).unwrap();
        assert_eq!(candidates[0].index, 0, "stage one favours rec-a");

        let reranked = rerank(db.index(), &candidates, &query, 1).unwrap();
        assert_eq!(reranked.len(), 1);
        assert_eq!(reranked[0].index, 1, "rerank promotes rec-b");
    }

    #[test]
    fn missing_rerank_vector_scores_zero() {
        let (_tmp, db) = db_fixture();
        let query = [0.0, 1.0];
        let candidates = crate::matcher::find_top_k(db.index(), &query, 3).unwrap();
        assert_eq!(candidates[0].index, 2, "rec-c matches the query exactly");

        let reranked = rerank(db.index(), &candidates, &query, 3).unwrap();
        let rec_c = reranked.iter().find(|m| m.index == 2).unwrap();
        // (1.0 + 0.0) / 2 with no reranking vector.
        assert!((rec_c.score - 0.5).abs() < 1e-5);
    }

    #[test]
    fn best_k_larger_than_pool_is_an_error() {
        let (_tmp, db) = db_fixture();
        let query = [1.0, 0.0];
        let candidates = crate::matcher::find_top_k(db.index(), &query, 2).unwrap();
        let err = rerank(db.index(), &candidates, &query, 3).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn mismatched_rerank_vector_dimension_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("database.json");
        let value = json!({
            "rec": {
                "chunks": ["alpha"],
                "embeddings": [[1.0, 0.0]],
                "reranking_embedding": [1.0, 0.0, 0.0]
            }
        });
        fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        let db = Database::load(&path).unwrap();

        let query = [1.0, 0.0];
        let candidates = crate::matcher::find_top_k(db.index(), &query, 1).unwrap();
        let err = rerank(db.index(), &candidates, &query, 1).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }
}
