use crate::error::IndexError;
use crate::persist::IndexStore;
use crate::{TermId, Token, UNKNOWN_TERM};
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecMode {
    /// Unseen terms get the next id.
    Build,
    /// Tables are frozen; unseen terms map to [`UNKNOWN_TERM`].
    Inference,
}

/// Term dictionary: bidirectional term <-> id mapping.
pub struct Codec {
    mode: CodecMode,
    next_id: TermId,
    ids: HashMap<String, TermId>,
    terms: HashMap<TermId, String>,
}

impl Codec {
    /// Empty dictionary in build mode. The first term gets id 1.
    pub fn build() -> Self {
        Self { mode: CodecMode::Build, next_id: 1, ids: HashMap::new(), terms: HashMap::new() }
    }

    /// Read the whole `terms` table into an inference-mode dictionary.
    pub fn load<S: IndexStore + ?Sized>(store: &S) -> Result<Self, IndexError> {
        let start = Instant::now();
        let rows = store.load_terms()?;
        let mut codec = Self {
            mode: CodecMode::Inference,
            next_id: 1,
            ids: HashMap::with_capacity(rows.len()),
            terms: HashMap::with_capacity(rows.len()),
        };
        for (id, term) in rows {
            codec.next_id = codec.next_id.max(id + 1);
            codec.ids.insert(term.clone(), id);
            codec.terms.insert(id, term);
        }
        tracing::info!(terms = codec.len(), elapsed_ms = start.elapsed().as_millis() as u64, "term dictionary loaded");
        Ok(codec)
    }

    pub fn mode(&self) -> CodecMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Id of `term`, assigning a fresh one in build mode.
    pub fn encode(&mut self, term: &str) -> TermId {
        if let Some(&id) = self.ids.get(term) {
            return id;
        }
        if self.mode == CodecMode::Inference {
            return UNKNOWN_TERM;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(term.to_owned(), id);
        self.terms.insert(id, term.to_owned());
        id
    }

    /// Id of `term` without ever assigning one.
    pub fn lookup(&self, term: &str) -> TermId {
        self.ids.get(term).copied().unwrap_or(UNKNOWN_TERM)
    }

    pub fn decode(&self, id: TermId) -> Option<&str> {
        self.terms.get(&id).map(String::as_str)
    }

    /// Encode a term stream, dropping terms that resolve to [`UNKNOWN_TERM`].
    pub fn tokens<I>(&mut self, terms: I) -> Vec<Token>
    where
        I: IntoIterator<Item = String>,
    {
        terms
            .into_iter()
            .filter_map(|text| match self.encode(&text) {
                UNKNOWN_TERM => None,
                id => Some(Token { id, text }),
            })
            .collect()
    }

    /// Replace the store's `terms` table with this dictionary. Build mode only.
    pub fn persist<S: IndexStore + ?Sized>(&self, store: &S) -> Result<usize, IndexError> {
        if self.mode != CodecMode::Build {
            return Err(IndexError::ReadOnlyCodec);
        }
        let start = Instant::now();
        let mut rows: Vec<(TermId, String)> = self.terms.iter().map(|(&id, t)| (id, t.clone())).collect();
        rows.sort_by_key(|(id, _)| *id);
        store.replace_terms(&rows)?;
        tracing::info!(terms = rows.len(), elapsed_ms = start.elapsed().as_millis() as u64, "term mapping saved");
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;

    #[test]
    fn ids_follow_first_seen_order() {
        let mut codec = Codec::build();
        assert_eq!(codec.encode("cat"), 1);
        assert_eq!(codec.encode("dog"), 2);
        assert_eq!(codec.encode("cat"), 1);
        assert_eq!(codec.encode("bird"), 3);
        for t in ["cat", "dog", "bird"] {
            assert_eq!(codec.decode(codec.lookup(t)), Some(t));
        }
        assert_eq!(codec.decode(UNKNOWN_TERM), None);
    }

    #[test]
    fn lookup_never_assigns() {
        let codec = Codec::build();
        assert_eq!(codec.lookup("cat"), UNKNOWN_TERM);
        assert!(codec.is_empty());
    }

    #[test]
    fn inference_mode_is_frozen() {
        let store = MemoryStore::new();
        let mut built = Codec::build();
        built.encode("cat");
        built.encode("dog");
        built.persist(&store).unwrap();

        let mut codec = Codec::load(&store).unwrap();
        assert_eq!(codec.mode(), CodecMode::Inference);
        assert_eq!(codec.encode("dog"), 2);
        assert_eq!(codec.encode("zebra"), UNKNOWN_TERM);
        assert_eq!(codec.len(), 2);
        assert!(matches!(codec.persist(&store), Err(IndexError::ReadOnlyCodec)));
    }

    #[test]
    fn tokens_drop_unknown_terms() {
        let store = MemoryStore::new();
        let mut built = Codec::build();
        built.encode("cat");
        built.persist(&store).unwrap();

        let mut codec = Codec::load(&store).unwrap();
        let toks = codec.tokens(vec!["cat".to_string(), "zebra".to_string()]);
        assert_eq!(toks, vec![Token { id: 1, text: "cat".into() }]);
    }
}
