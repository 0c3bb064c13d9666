//! Embeddable full-text search and autocomplete.
//!
//! Build side: [`session::BuildSession`] drives [`tokenizer`], [`codec::Codec`]
//! and [`index::IndexBuilder`] over an [`persist::IndexStore`]. Query side:
//! [`search::SearchEngine`] for TF-IDF ranking and [`trie::Trie`] for prefix
//! suggestions.

pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod memory_store;
pub mod persist;
pub mod search;
pub mod session;
pub mod tokenizer;
pub mod trie;

pub use codec::{Codec, CodecMode};
pub use config::EngineConfig;
pub use error::{ConfigError, IndexError, StoreError};
pub use index::{idf, DocId, DocMeta, DocumentInput, IndexBuilder, IndexSummary, Posting, TermId, Token, UNKNOWN_TERM};
pub use memory_store::MemoryStore;
pub use persist::{IndexStore, MetaFile, SledStore};
pub use search::{SearchEngine, SearchHit};
pub use session::BuildSession;
pub use trie::{Trie, TrieBuilder};
