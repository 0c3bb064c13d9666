use crate::codec::Codec;
use crate::config::EngineConfig;
use crate::error::{IndexError, StoreError};
use crate::persist::{IndexStore, MetaFile};
use crate::tokenizer::{gramify, tokenize};
use crate::trie::{Trie, TrieBuilder};
use crate::{DocId, DocMeta, TermId, UNKNOWN_TERM};
use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub name: String,
    pub title: String,
    pub path: String,
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A scored candidate. Orders by score, then by lower document id, so that
/// "greater" always means "ranks first".
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scored {
    doc_id: DocId,
    score: f64,
}

impl Eq for Scored {}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best `k` candidates, score descending, ties by document id ascending.
///
/// Keeps a min-heap of at most `k` entries instead of sorting every candidate.
pub fn top_k<I>(candidates: I, k: usize) -> Vec<(DocId, f64)>
where
    I: IntoIterator<Item = (DocId, f64)>,
{
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<Reverse<Scored>> = BinaryHeap::with_capacity(k + 1);
    for (doc_id, score) in candidates {
        let candidate = Scored { doc_id, score };
        if heap.len() < k {
            heap.push(Reverse(candidate));
        } else if heap.peek().is_some_and(|Reverse(worst)| candidate > *worst) {
            heap.pop();
            heap.push(Reverse(candidate));
        }
    }
    let mut best: Vec<Scored> = heap.into_iter().map(|Reverse(s)| s).collect();
    best.sort_by(|a, b| b.cmp(a));
    best.into_iter().map(|s| (s.doc_id, s.score)).collect()
}

/// Read-only query side of a finalized index.
///
/// Holds no mutable state, so one engine can serve any number of concurrent
/// callers as long as the store handle is thread-safe.
pub struct SearchEngine<S: IndexStore> {
    store: S,
    codec: Codec,
    config: EngineConfig,
    meta: MetaFile,
}

impl<S: IndexStore> SearchEngine<S> {
    /// Load the dictionary and check the index is finalized.
    pub fn open(store: S, config: EngineConfig) -> Result<Self, IndexError> {
        let meta = store
            .meta()?
            .ok_or_else(|| StoreError::SchemaMismatch("missing index header".into()))?;
        if !meta.finalized {
            return Err(IndexError::NotFinalized);
        }
        if (config.index_gram_min, config.index_gram_max) != (meta.index_gram_min, meta.index_gram_max) {
            tracing::warn!(
                config_min = config.index_gram_min,
                config_max = config.index_gram_max,
                index_min = meta.index_gram_min,
                index_max = meta.index_gram_max,
                "config gram range differs from the index; queries use the index range"
            );
        }
        let codec = Codec::load(&store)?;
        tracing::info!(num_docs = meta.num_docs, terms = codec.len(), created_at = %meta.created_at, "search engine ready");
        Ok(Self { store, codec, config, meta })
    }

    pub fn meta(&self) -> &MetaFile {
        &self.meta
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rank documents against already tokenized query terms.
    ///
    /// Unknown terms are dropped; if none remain the result is empty. Score is
    /// the sum of `tf * idf` over the distinct query terms present in a
    /// document; only positive scores are returned.
    pub fn search<T: AsRef<str>>(&self, terms: &[T], max_results: usize) -> Result<Vec<SearchHit>, IndexError> {
        let start = Instant::now();
        let ids: BTreeSet<TermId> = terms
            .iter()
            .map(|t| self.codec.lookup(t.as_ref()))
            .filter(|&id| id != UNKNOWN_TERM)
            .collect();
        if ids.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let mut scores: HashMap<DocId, f64> = HashMap::new();
        for &tid in &ids {
            for posting in self.store.postings(tid)? {
                let idf = posting.idf.ok_or(IndexError::NotFinalized)?;
                *scores.entry(posting.doc_id).or_insert(0.0) += posting.tf * idf;
            }
        }
        let candidates: Vec<(DocId, f64)> = scores.into_iter().filter(|&(_, score)| score > 0.0).collect();

        // Join with the documents table before the limit counts: a posting
        // whose document row is gone widens the window instead of
        // shrinking the result.
        let mut hits = Vec::with_capacity(max_results.min(candidates.len()));
        let mut seen = 0;
        let mut window = max_results;
        loop {
            let ranked = top_k(candidates.iter().copied(), window);
            for &(doc_id, score) in &ranked[seen..] {
                if hits.len() == max_results {
                    break;
                }
                match self.store.document(doc_id)? {
                    Some(meta) => hits.push(SearchHit {
                        doc_id,
                        score,
                        name: meta.name,
                        title: meta.title,
                        path: meta.path,
                        url: meta.url,
                        description: meta.description,
                    }),
                    None => tracing::warn!(doc_id, "postings reference a missing document"),
                }
            }
            if hits.len() == max_results || ranked.len() < window {
                break;
            }
            seen = ranked.len();
            window += max_results - hits.len();
        }
        tracing::debug!(
            terms = ids.len(),
            candidates = candidates.len(),
            hits = hits.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "search"
        );
        Ok(hits)
    }

    /// Tokenize a raw query with the span range recorded in the index header,
    /// then [`SearchEngine::search`].
    pub fn search_text(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, IndexError> {
        let terms: Vec<String> = tokenize(query.as_bytes()).collect();
        let grams: Vec<String> = gramify(&terms, self.meta.index_gram_min, self.meta.index_gram_max).collect();
        self.search(&grams, max_results)
    }

    pub fn document(&self, doc_id: DocId) -> Result<Option<DocMeta>, IndexError> {
        Ok(self.store.document(doc_id)?)
    }

    /// Rebuild the autocomplete trie from the persisted suggestion counts.
    pub fn load_trie(&self) -> Result<Trie, IndexError> {
        let mut builder = TrieBuilder::new();
        for (gram, count) in self.store.suggestions()? {
            builder.insert_weighted(&gram, count);
        }
        Ok(builder.finalize(self.config.suggestion_top_n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_is_bounded_and_descending() {
        let got = top_k(vec![(1, 0.2), (2, 0.9), (3, 0.5), (4, 0.7)], 2);
        assert_eq!(got, vec![(2, 0.9), (4, 0.7)]);
    }

    #[test]
    fn top_k_breaks_ties_by_doc_id() {
        let got = top_k(vec![(7, 1.0), (3, 1.0), (5, 1.0), (1, 0.5)], 3);
        assert_eq!(got, vec![(3, 1.0), (5, 1.0), (7, 1.0)]);
    }

    #[test]
    fn top_k_handles_small_inputs() {
        assert!(top_k(vec![(1, 1.0)], 0).is_empty());
        assert_eq!(top_k(vec![(1, 1.0)], 10), vec![(1, 1.0)]);
        assert!(top_k(Vec::new(), 3).is_empty());
    }
}
