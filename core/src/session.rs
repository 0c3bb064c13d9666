use crate::codec::Codec;
use crate::config::EngineConfig;
use crate::error::IndexError;
use crate::index::{DocumentInput, IndexBuilder, IndexSummary};
use crate::persist::IndexStore;
use crate::tokenizer::{gramify, tokenize};
use crate::DocId;
use std::collections::HashMap;
use std::time::Instant;

/// One build pass: owns the codec, the index builder and the suggestion
/// counts. Feed documents with [`BuildSession::add_document`], then call
/// [`BuildSession::finish`] exactly once.
pub struct BuildSession<S: IndexStore> {
    config: EngineConfig,
    codec: Codec,
    builder: IndexBuilder<S>,
    suggestions: HashMap<String, u64>,
    started: Instant,
}

impl<S: IndexStore> BuildSession<S> {
    pub fn new(store: S, config: EngineConfig) -> Result<Self, IndexError> {
        config.validate()?;
        Ok(Self {
            config,
            codec: Codec::build(),
            builder: IndexBuilder::new(store),
            suggestions: HashMap::new(),
            started: Instant::now(),
        })
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn num_docs(&self) -> u32 {
        self.builder.num_docs()
    }

    /// Tokenize, encode and index one document.
    ///
    /// On error the document is not indexed and the session stays usable, so
    /// the caller may log and move on to the next document.
    pub fn add_document(&mut self, doc: DocumentInput) -> Result<DocId, IndexError> {
        let content_terms: Vec<String> = tokenize(&doc.content).collect();
        let mut terms: Vec<String> = tokenize(doc.title.as_bytes()).collect();
        terms.extend(content_terms.iter().cloned());

        let grams = gramify(&terms, self.config.index_gram_min, self.config.index_gram_max);
        let tokens = self.codec.tokens(grams);
        let doc_id = self.builder.add_document(&doc.meta(), &tokens)?;

        for gram in gramify(&content_terms, self.config.suggest_gram_min, self.config.suggest_gram_max) {
            *self.suggestions.entry(gram).or_insert(0) += 1;
        }
        Ok(doc_id)
    }

    /// Finalize IDF, persist the dictionary and suggestions, then mark the
    /// index finalized. Any error here leaves the index unpublished.
    pub fn finish(self) -> Result<IndexSummary, IndexError> {
        let Self { config, codec, builder, suggestions, started } = self;
        let (store, summary) = builder.finish()?;

        codec.persist(&store)?;

        let mut grams: Vec<(String, u64)> = suggestions.into_iter().collect();
        grams.sort();
        store.replace_suggestions(&grams)?;
        tracing::info!(suggestions = grams.len(), "suggestions saved");

        let mut meta = store.meta()?.unwrap_or_else(crate::persist::MetaFile::pending);
        meta.num_docs = summary.num_docs;
        meta.num_terms = codec.len() as u32;
        meta.total_occurrences = summary.total_occurrences;
        meta.index_gram_min = config.index_gram_min;
        meta.index_gram_max = config.index_gram_max;
        meta.finalized = true;
        store.write_meta(&meta)?;

        tracing::info!(
            num_docs = summary.num_docs,
            num_terms = meta.num_terms,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "index build complete"
        );
        Ok(summary)
    }
}
