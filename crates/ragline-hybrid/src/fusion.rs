//! Merging the lexical and dense hit lists into one candidate order.

use std::collections::HashMap;

use ragline_core::config::{FusionKind, RetrievalSettings};
use ragline_core::types::{DocId, SearchHit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionStrategy {
    /// Lexical hits in rank order, then dense hits in rank order.
    Concatenate,
    /// Reciprocal Rank Fusion: `score = Σ 1/(k + rank)` over both lists.
    ReciprocalRank { k: usize },
}

impl FusionStrategy {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        match settings.fusion {
            FusionKind::Concatenate => Self::Concatenate,
            FusionKind::ReciprocalRank => Self::ReciprocalRank { k: settings.rrf_k },
        }
    }

    /// Candidate ids in fused order. Ids may repeat under `Concatenate`; the
    /// retriever deduplicates by content afterwards.
    pub fn fuse(&self, lexical: &[SearchHit], dense: &[SearchHit]) -> Vec<DocId> {
        match self {
            Self::Concatenate => lexical.iter().chain(dense).map(|h| h.id.clone()).collect(),
            Self::ReciprocalRank { k } => reciprocal_rank_fusion(&[lexical, dense], *k),
        }
    }
}

/// RRF over several ranked lists. Ties keep first-seen order.
pub fn reciprocal_rank_fusion(ranked_lists: &[&[SearchHit]], k: usize) -> Vec<DocId> {
    let mut order: Vec<DocId> = Vec::new();
    let mut scores: HashMap<DocId, f32> = HashMap::new();
    for list in ranked_lists {
        for (rank, hit) in list.iter().enumerate() {
            let contribution = 1.0 / (k as f32 + (rank + 1) as f32);
            match scores.get_mut(&hit.id) {
                Some(score) => *score += contribution,
                None => {
                    scores.insert(hit.id.clone(), contribution);
                    order.push(hit.id.clone());
                }
            }
        }
    }
    let mut fused: Vec<(DocId, f32)> = order
        .into_iter()
        .map(|id| {
            let score = scores.get(&id).copied().unwrap_or(0.0);
            (id, score)
        })
        .collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused.into_iter().map(|(id, _)| id).collect()
}
