//! Hypothesis ranker
//!
//! Plurality vote over the category labels of the top-k passages, then
//! one representative criterion per winning category: its longest
//! criteria excerpt.

use std::collections::HashMap;

use super::EvidenceStore;
use crate::error::RetrievalError;
use crate::types::{Candidate, EvidenceItem, SectionKind};

#[derive(Debug, Clone, Copy)]
pub struct HypothesisRanker {
    top_k: usize,
    candidate_count: usize,
}

impl HypothesisRanker {
    pub fn new(top_k: usize, candidate_count: usize) -> Self {
        Self {
            top_k,
            candidate_count,
        }
    }

    /// Top-N category labels by frequency in the first `top_k` items.
    /// Ties keep first-seen order. Blank labels do not vote.
    pub fn tally(&self, items: &[EvidenceItem]) -> Vec<String> {
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();

        for item in items.iter().take(self.top_k) {
            let label = item.category.trim();
            if label.is_empty() {
                continue;
            }
            let count = counts.entry(label).or_insert(0);
            if *count == 0 {
                order.push(label);
            }
            *count += 1;
        }

        // Stable sort over first-seen order keeps ties deterministic
        order.sort_by(|a, b| counts[b].cmp(&counts[a]));
        order
            .into_iter()
            .take(self.candidate_count)
            .map(str::to_string)
            .collect()
    }

    /// Longest criteria-section excerpt by character count; first wins ties
    pub fn representative(criteria: &[EvidenceItem]) -> Option<EvidenceItem> {
        let mut best: Option<&EvidenceItem> = None;
        for item in criteria.iter().filter(|i| i.section == SectionKind::Criteria) {
            if best.map_or(true, |b| item.char_len() > b.char_len()) {
                best = Some(item);
            }
        }
        best.cloned()
    }

    /// Rank candidates for a symptom query's retrieval results
    pub async fn rank(
        &self,
        items: &[EvidenceItem],
        store: &dyn EvidenceStore,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let mut candidates = Vec::new();
        for (index, category) in self.tally(items).into_iter().enumerate() {
            let criteria = store.criteria_for(&category).await?;
            let evidence = Self::representative(&criteria);
            if evidence.is_none() {
                tracing::debug!(category = %category, "no criteria excerpt for candidate");
            }
            candidates.push(Candidate {
                category,
                rank: index + 1,
                evidence,
            });
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::MemoryEvidenceStore;
    use proptest::prelude::*;

    fn narrative(category: &str) -> EvidenceItem {
        EvidenceItem::new("passage", category, SectionKind::Narrative)
    }

    fn criteria(text: &str, category: &str) -> EvidenceItem {
        EvidenceItem::new(text, category, SectionKind::Criteria)
    }

    #[test]
    fn test_tally_plurality_with_first_seen_ties() {
        let items = vec![
            narrative("B"),
            narrative("A"),
            narrative("C"),
            narrative("A"),
            narrative("B"),
            narrative("D"),
        ];
        let ranker = HypothesisRanker::new(12, 3);
        assert_eq!(ranker.tally(&items), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_tally_only_counts_top_k() {
        let items = vec![narrative("A"), narrative("B"), narrative("B"), narrative("B")];
        let ranker = HypothesisRanker::new(2, 3);
        assert_eq!(ranker.tally(&items), vec!["A", "B"]);
    }

    #[test]
    fn test_representative_is_longest_by_chars() {
        // 5 multi-byte chars are 15 bytes but shorter than 6 ASCII chars
        let items = vec![
            criteria("가나다라마", "A"),
            criteria("abcdef", "A"),
            narrative("A"),
        ];
        let rep = HypothesisRanker::representative(&items).unwrap();
        assert_eq!(rep.text, "abcdef");
        assert!(HypothesisRanker::representative(&[narrative("A")]).is_none());
    }

    #[tokio::test]
    async fn test_rank_keeps_candidates_without_criteria() {
        let store = MemoryEvidenceStore::new(
            vec![criteria("short", "A"), criteria("a much longer criterion", "A")],
            vec![],
        );
        let items = vec![narrative("A"), narrative("B"), narrative("A")];
        let candidates = HypothesisRanker::new(12, 3)
            .rank(&items, &store)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].category, "A");
        assert_eq!(candidates[0].rank, 1);
        assert_eq!(
            candidates[0].evidence.as_ref().unwrap().text,
            "a much longer criterion"
        );
        assert_eq!(candidates[1].category, "B");
        assert!(candidates[1].evidence.is_none());
    }

    proptest! {
        #[test]
        fn prop_tally_is_deterministic(labels in proptest::collection::vec("[A-E]", 0..30), n in 1usize..5) {
            let items: Vec<_> = labels.iter().map(|l| narrative(l)).collect();
            let ranker = HypothesisRanker::new(12, n);
            let first = ranker.tally(&items);
            prop_assert_eq!(&first, &ranker.tally(&items));
            prop_assert!(first.len() <= n);
        }
    }
}
