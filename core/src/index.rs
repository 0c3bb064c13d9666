use crate::error::IndexError;
use crate::persist::IndexStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

pub type TermId = u32;
pub type DocId = u32;

/// Reserved id for a term the dictionary has never seen.
pub const UNKNOWN_TERM: TermId = 0;

/// A term paired with its dictionary id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: TermId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    /// Identifier assigned by the corpus walker (file name, record id, ...).
    pub name: String,
    pub title: String,
    pub path: String,
    pub url: Option<String>,
    /// Short summary shown next to a hit.
    pub description: Option<String>,
}

/// One document as handed over by the corpus walker.
#[derive(Debug, Clone, Default)]
pub struct DocumentInput {
    pub name: String,
    pub title: String,
    pub path: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub content: Vec<u8>,
}

impl DocumentInput {
    pub fn meta(&self) -> DocMeta {
        DocMeta {
            name: self.name.clone(),
            title: self.title.clone(),
            path: self.path.clone(),
            url: self.url.clone(),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub term_id: TermId,
    pub doc_id: DocId,
    /// raw frequency / document token count, in [0, 1]
    pub tf: f64,
    /// unset until the builder is finished
    pub idf: Option<f64>,
}

/// Inverse document frequency as this engine defines it.
///
/// The denominator is the term's aggregate occurrence count across the
/// corpus, not the number of documents containing it. Floored at 1.0.
pub fn idf(total_occurrences: u64, term_occurrences: u64) -> f64 {
    (total_occurrences as f64 / (1 + term_occurrences) as f64).log10().max(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexSummary {
    pub num_docs: u32,
    pub num_terms: u32,
    pub total_occurrences: u64,
    pub postings_updated: u64,
}

/// Accumulates postings and corpus statistics during one build pass.
///
/// Not shareable between threads while building; consumed by [`IndexBuilder::finish`].
pub struct IndexBuilder<S: IndexStore> {
    store: S,
    next_doc_id: DocId,
    total_occurrences: u64,
    occurrences: HashMap<TermId, u64>,
}

impl<S: IndexStore> IndexBuilder<S> {
    pub fn new(store: S) -> Self {
        Self { store, next_doc_id: 1, total_occurrences: 0, occurrences: HashMap::new() }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn num_docs(&self) -> u32 {
        self.next_doc_id - 1
    }

    pub fn total_occurrences(&self) -> u64 {
        self.total_occurrences
    }

    /// Write one document and its postings in a single store transaction.
    ///
    /// Corpus counters only move once the write has committed, so a failed
    /// document leaves no trace in the IDF statistics.
    pub fn add_document(&mut self, meta: &DocMeta, tokens: &[Token]) -> Result<DocId, IndexError> {
        let mut raw: HashMap<TermId, u64> = HashMap::new();
        for token in tokens {
            *raw.entry(token.id).or_insert(0) += 1;
        }

        let total = tokens.len() as f64;
        let mut rows: Vec<(TermId, f64)> = raw.iter().map(|(&tid, &freq)| (tid, freq as f64 / total)).collect();
        rows.sort_by_key(|(tid, _)| *tid);

        let doc_id = self.next_doc_id;
        self.store.append_document(doc_id, meta, &rows)?;
        self.next_doc_id += 1;

        for (tid, freq) in raw {
            *self.occurrences.entry(tid).or_insert(0) += freq;
            self.total_occurrences += freq;
        }
        tracing::debug!(doc_id, name = %meta.name, terms = rows.len(), "document added");
        Ok(doc_id)
    }

    /// Compute the IDF table, back-fill every posting, then compact the store.
    ///
    /// Must run after the last document; IDF is a corpus-wide statistic.
    pub fn finish(self) -> Result<(S, IndexSummary), IndexError> {
        let start = Instant::now();
        let table: HashMap<TermId, f64> = self
            .occurrences
            .iter()
            .map(|(&tid, &freq)| (tid, idf(self.total_occurrences, freq)))
            .collect();

        let postings_updated = self.store.apply_idf(&table)?;
        tracing::info!(terms = table.len(), postings = postings_updated, elapsed_ms = start.elapsed().as_millis() as u64, "idf saved");

        let start = Instant::now();
        self.store.compact()?;
        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "index compacted");

        let summary = IndexSummary {
            num_docs: self.next_doc_id - 1,
            num_terms: table.len() as u32,
            total_occurrences: self.total_occurrences,
            postings_updated,
        };
        Ok((self.store, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;

    fn tok(id: TermId) -> Token {
        Token { id, text: format!("t{id}") }
    }

    fn meta(name: &str) -> DocMeta {
        DocMeta { name: name.into(), title: String::new(), path: String::new(), url: None, description: None }
    }

    #[test]
    fn idf_uses_occurrence_counts_with_floor() {
        assert_eq!(idf(5, 2), 1.0);
        assert_eq!(idf(1000, 9), 2.0);
        assert_eq!(idf(10_000, 9), (10_000f64 / 10.0).log10());
    }

    #[test]
    fn tf_is_raw_frequency_over_token_count() {
        let mut builder = IndexBuilder::new(MemoryStore::new());
        let doc = builder.add_document(&meta("d"), &[tok(1), tok(2), tok(1), tok(3)]).unwrap();
        assert_eq!(doc, 1);
        let postings = builder.store().postings(1).unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].tf, 0.5);
        assert_eq!(postings[0].idf, None);
    }

    #[test]
    fn finish_backfills_every_posting() {
        let mut builder = IndexBuilder::new(MemoryStore::new());
        builder.add_document(&meta("a"), &[tok(1), tok(2), tok(1)]).unwrap();
        builder.add_document(&meta("b"), &[tok(2), tok(3)]).unwrap();
        assert_eq!(builder.total_occurrences(), 5);

        let (store, summary) = builder.finish().unwrap();
        assert_eq!(summary.num_docs, 2);
        assert_eq!(summary.num_terms, 3);
        assert_eq!(summary.postings_updated, 4);
        for tid in 1..=3 {
            for p in store.postings(tid).unwrap() {
                assert!(p.idf.is_some());
            }
        }
    }

    #[test]
    fn doc_ids_follow_insertion_order() {
        let mut builder = IndexBuilder::new(MemoryStore::new());
        let ids: Vec<DocId> = ["a", "b", "c"].iter().map(|n| builder.add_document(&meta(n), &[tok(1)]).unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
