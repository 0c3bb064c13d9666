use crate::error::StoreError;
use crate::{DocId, DocMeta, Posting, TermId};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::collections::HashMap;
use std::convert::Infallible;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 2;

const TERMS: &str = "terms";
const DOCUMENTS: &str = "documents";
const POSTINGS: &str = "postings";
const SUGGESTIONS: &str = "suggestions";
const META_KEY: &[u8] = b"meta";

/// Index header, written when a build starts and again once it is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub num_docs: u32,
    pub num_terms: u32,
    pub total_occurrences: u64,
    pub created_at: String,
    pub finalized: bool,
    /// Span range the index was built with; queries must be gramified the same way.
    pub index_gram_min: usize,
    pub index_gram_max: usize,
}

impl MetaFile {
    pub fn pending() -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self {
            version: SCHEMA_VERSION,
            num_docs: 0,
            num_terms: 0,
            total_occurrences: 0,
            created_at,
            finalized: false,
            index_gram_min: 1,
            index_gram_max: 1,
        }
    }
}

/// The persistence contract consumed by the codec, the index builder and the
/// search engine. Implementations must make `append_document` all-or-nothing.
pub trait IndexStore: Send + Sync {
    /// Write one `documents` row and its `postings` rows (idf unset) atomically.
    fn append_document(&self, doc_id: DocId, meta: &DocMeta, postings: &[(TermId, f64)]) -> Result<(), StoreError>;
    /// Set idf on every posting of each listed term; returns postings touched.
    fn apply_idf(&self, idf: &HashMap<TermId, f64>) -> Result<u64, StoreError>;
    /// All postings for one term, ordered by document id.
    fn postings(&self, term_id: TermId) -> Result<Vec<Posting>, StoreError>;
    fn document(&self, doc_id: DocId) -> Result<Option<DocMeta>, StoreError>;
    fn replace_terms(&self, terms: &[(TermId, String)]) -> Result<(), StoreError>;
    fn load_terms(&self) -> Result<Vec<(TermId, String)>, StoreError>;
    fn replace_suggestions(&self, grams: &[(String, u64)]) -> Result<(), StoreError>;
    fn suggestions(&self) -> Result<Vec<(String, u64)>, StoreError>;
    fn write_meta(&self, meta: &MetaFile) -> Result<(), StoreError>;
    fn meta(&self) -> Result<Option<MetaFile>, StoreError>;
    fn compact(&self) -> Result<(), StoreError>;
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn db(&self) -> PathBuf { self.root.join("index.sled") }
}

#[derive(Serialize, Deserialize)]
struct PostingValue {
    tf: f64,
    idf: Option<f64>,
}

/// Posting keys sort by term id first, so a term's postings are one prefix range.
fn posting_key(term_id: TermId, doc_id: DocId) -> [u8; 8] {
    let mut key = [0u8; 8];
    key[..4].copy_from_slice(&term_id.to_be_bytes());
    key[4..].copy_from_slice(&doc_id.to_be_bytes());
    key
}

fn u32_from(bytes: &[u8]) -> Result<u32, StoreError> {
    let arr: [u8; 4] = bytes
        .try_into()
        .map_err(|_| StoreError::SchemaMismatch(format!("expected 4-byte key, got {}", bytes.len())))?;
    Ok(u32::from_be_bytes(arr))
}

fn u64_from(bytes: &[u8]) -> Result<u64, StoreError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::SchemaMismatch(format!("expected 8-byte value, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

/// [`IndexStore`] on top of an embedded sled database, one tree per table.
///
/// Cloning is cheap and yields another handle onto the same database.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    terms: sled::Tree,
    documents: sled::Tree,
    postings: sled::Tree,
    suggestions: sled::Tree,
}

impl SledStore {
    /// Open for a build: creates the database if needed and empties every table.
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let paths = IndexPaths::new(root);
        std::fs::create_dir_all(&paths.root)?;
        tracing::info!(path = %paths.db().display(), "rebuilding index store");
        let store = Self::from_db(sled::open(paths.db())?)?;
        store.reset()?;
        Ok(store)
    }

    /// Open an existing, already built index. Never creates anything.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let paths = IndexPaths::new(root);
        let db_path = paths.db();
        if !db_path.is_dir() {
            return Err(StoreError::Missing(db_path));
        }
        let db = sled::open(&db_path)?;
        let names = db.tree_names();
        for required in [TERMS, DOCUMENTS, POSTINGS, SUGGESTIONS] {
            if !names.iter().any(|n| &**n == required.as_bytes()) {
                return Err(StoreError::SchemaMismatch(format!("missing table {required}")));
            }
        }
        let store = Self::from_db(db)?;
        match store.meta()? {
            Some(meta) if meta.version == SCHEMA_VERSION => Ok(store),
            Some(meta) => Err(StoreError::SchemaMismatch(format!(
                "schema version {} (expected {SCHEMA_VERSION})",
                meta.version
            ))),
            None => Err(StoreError::SchemaMismatch("missing index header".into())),
        }
    }

    /// Throwaway database, removed on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        let store = Self::from_db(sled::Config::new().temporary(true).open()?)?;
        store.reset()?;
        Ok(store)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            terms: db.open_tree(TERMS)?,
            documents: db.open_tree(DOCUMENTS)?,
            postings: db.open_tree(POSTINGS)?,
            suggestions: db.open_tree(SUGGESTIONS)?,
            db,
        })
    }

    /// Unpublish first, then empty the tables, so an interrupted rebuild is
    /// never mistaken for a finished index.
    fn reset(&self) -> Result<(), StoreError> {
        self.write_meta(&MetaFile::pending())?;
        for tree in [&self.terms, &self.documents, &self.postings, &self.suggestions] {
            tree.clear()?;
        }
        self.db.flush()?;
        Ok(())
    }
}

impl IndexStore for SledStore {
    fn append_document(&self, doc_id: DocId, meta: &DocMeta, postings: &[(TermId, f64)]) -> Result<(), StoreError> {
        let doc_value = bincode::serialize(meta)?;
        let rows = postings
            .iter()
            .map(|&(tid, tf)| -> Result<_, StoreError> {
                Ok((posting_key(tid, doc_id), bincode::serialize(&PostingValue { tf, idf: None })?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        (&self.documents, &self.postings)
            .transaction(|(docs, posts)| {
                docs.insert(&doc_id.to_be_bytes()[..], doc_value.as_slice())?;
                for (key, value) in &rows {
                    posts.insert(&key[..], value.as_slice())?;
                }
                Ok::<(), ConflictableTransactionError<Infallible>>(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(never) => match never {},
                TransactionError::Storage(e) => StoreError::Sled(e),
            })
    }

    fn apply_idf(&self, idf: &HashMap<TermId, f64>) -> Result<u64, StoreError> {
        let mut batch = sled::Batch::default();
        let mut updated = 0u64;
        for (&tid, &value) in idf {
            for entry in self.postings.scan_prefix(tid.to_be_bytes()) {
                let (key, raw) = entry?;
                let mut posting: PostingValue = bincode::deserialize(&raw)?;
                posting.idf = Some(value);
                batch.insert(key, bincode::serialize(&posting)?);
                updated += 1;
            }
        }
        self.postings.apply_batch(batch)?;
        Ok(updated)
    }

    fn postings(&self, term_id: TermId) -> Result<Vec<Posting>, StoreError> {
        let mut out = Vec::new();
        for entry in self.postings.scan_prefix(term_id.to_be_bytes()) {
            let (key, raw) = entry?;
            let value: PostingValue = bincode::deserialize(&raw)?;
            out.push(Posting { term_id, doc_id: u32_from(&key[4..])?, tf: value.tf, idf: value.idf });
        }
        Ok(out)
    }

    fn document(&self, doc_id: DocId) -> Result<Option<DocMeta>, StoreError> {
        match self.documents.get(doc_id.to_be_bytes())? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn replace_terms(&self, terms: &[(TermId, String)]) -> Result<(), StoreError> {
        self.terms.clear()?;
        let mut batch = sled::Batch::default();
        for (tid, term) in terms {
            batch.insert(tid.to_be_bytes().to_vec(), term.as_bytes());
        }
        self.terms.apply_batch(batch)?;
        Ok(())
    }

    fn load_terms(&self) -> Result<Vec<(TermId, String)>, StoreError> {
        let mut out = Vec::with_capacity(self.terms.len());
        for entry in self.terms.iter() {
            let (key, raw) = entry?;
            let term = String::from_utf8(raw.to_vec())
                .map_err(|e| StoreError::SchemaMismatch(format!("term is not utf-8: {e}")))?;
            out.push((u32_from(&key)?, term));
        }
        Ok(out)
    }

    fn replace_suggestions(&self, grams: &[(String, u64)]) -> Result<(), StoreError> {
        self.suggestions.clear()?;
        let mut batch = sled::Batch::default();
        for (gram, count) in grams {
            batch.insert(gram.as_bytes(), count.to_be_bytes().to_vec());
        }
        self.suggestions.apply_batch(batch)?;
        Ok(())
    }

    fn suggestions(&self) -> Result<Vec<(String, u64)>, StoreError> {
        let mut out = Vec::with_capacity(self.suggestions.len());
        for entry in self.suggestions.iter() {
            let (key, raw) = entry?;
            let gram = String::from_utf8(key.to_vec())
                .map_err(|e| StoreError::SchemaMismatch(format!("suggestion is not utf-8: {e}")))?;
            out.push((gram, u64_from(&raw)?));
        }
        Ok(out)
    }

    fn write_meta(&self, meta: &MetaFile) -> Result<(), StoreError> {
        self.db.insert(META_KEY, serde_json::to_vec_pretty(meta)?)?;
        self.db.flush()?;
        Ok(())
    }

    fn meta(&self) -> Result<Option<MetaFile>, StoreError> {
        match self.db.get(META_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn compact(&self) -> Result<(), StoreError> {
        // Posting keys already cluster by term id; flushing makes them durable.
        let bytes = self.db.flush()?;
        tracing::info!(bytes, size_on_disk = self.db.size_on_disk().unwrap_or(0), "store flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn meta(name: &str) -> DocMeta {
        DocMeta { name: name.into(), title: format!("Title {name}"), path: format!("{name}.json"), url: None, description: None }
    }

    #[test]
    fn postings_are_grouped_by_term() {
        let store = SledStore::temporary().unwrap();
        store.append_document(1, &meta("a"), &[(1, 0.5), (2, 0.5)]).unwrap();
        store.append_document(2, &meta("b"), &[(2, 1.0)]).unwrap();

        let p = store.postings(2).unwrap();
        assert_eq!(p.iter().map(|p| p.doc_id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(p.iter().all(|p| p.idf.is_none()));
        assert!(store.postings(3).unwrap().is_empty());
        assert_eq!(store.document(2).unwrap(), Some(meta("b")));
    }

    #[test]
    fn apply_idf_touches_only_listed_terms() {
        let store = SledStore::temporary().unwrap();
        store.append_document(1, &meta("a"), &[(1, 0.5), (2, 0.5)]).unwrap();
        let updated = store.apply_idf(&HashMap::from([(1, 1.5)])).unwrap();
        assert_eq!(updated, 1);
        assert_eq!(store.postings(1).unwrap()[0].idf, Some(1.5));
        assert_eq!(store.postings(2).unwrap()[0].idf, None);
    }

    #[test]
    fn open_missing_store_fails() {
        let dir = tempdir().unwrap();
        let err = SledStore::open(dir.path().join("nope")).err().unwrap();
        assert!(matches!(err, StoreError::Missing(_)));
    }

    #[test]
    fn open_rejects_foreign_database() {
        let dir = tempdir().unwrap();
        {
            let db = sled::open(IndexPaths::new(dir.path()).db()).unwrap();
            db.insert(b"something", b"else").unwrap();
            db.flush().unwrap();
        }
        let err = SledStore::open(dir.path()).err().unwrap();
        assert!(matches!(err, StoreError::SchemaMismatch(_)));
    }

    #[test]
    fn terms_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = SledStore::create(dir.path()).unwrap();
            store.replace_terms(&[(1, "cat".into()), (2, "dog".into())]).unwrap();
            store.replace_suggestions(&[("cat".into(), 3)]).unwrap();
            store.compact().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.load_terms().unwrap(), vec![(1, "cat".to_string()), (2, "dog".to_string())]);
        assert_eq!(store.suggestions().unwrap(), vec![("cat".to_string(), 3)]);
        assert!(!store.meta().unwrap().unwrap().finalized);
    }

    #[test]
    fn rebuild_unpublishes_the_previous_index() {
        let dir = tempdir().unwrap();
        {
            let store = SledStore::create(dir.path()).unwrap();
            store.append_document(1, &meta("a"), &[(1, 1.0)]).unwrap();
            store.write_meta(&MetaFile { finalized: true, num_docs: 1, ..MetaFile::pending() }).unwrap();
        }
        let store = SledStore::create(dir.path()).unwrap();
        let header = store.meta().unwrap().unwrap();
        assert!(!header.finalized);
        assert_eq!(header.num_docs, 0);
        assert_eq!(store.document(1).unwrap(), None);
        assert!(store.postings(1).unwrap().is_empty());
    }
}
