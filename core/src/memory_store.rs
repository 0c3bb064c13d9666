use crate::error::StoreError;
use crate::persist::{IndexStore, MetaFile};
use crate::{DocId, DocMeta, Posting, TermId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct Tables {
    terms: BTreeMap<TermId, String>,
    documents: BTreeMap<DocId, DocMeta>,
    postings: BTreeMap<(TermId, DocId), (f64, Option<f64>)>,
    suggestions: BTreeMap<String, u64>,
    meta: Option<MetaFile>,
}

/// In-process [`IndexStore`]. Nothing survives the process.
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { tables: RwLock::new(Tables { meta: Some(MetaFile::pending()), ..Tables::default() }) }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexStore for MemoryStore {
    fn append_document(&self, doc_id: DocId, meta: &DocMeta, postings: &[(TermId, f64)]) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        t.documents.insert(doc_id, meta.clone());
        for &(tid, tf) in postings {
            t.postings.insert((tid, doc_id), (tf, None));
        }
        Ok(())
    }

    fn apply_idf(&self, idf: &HashMap<TermId, f64>) -> Result<u64, StoreError> {
        let mut t = self.tables.write();
        let mut updated = 0;
        for ((tid, _), (_, slot)) in t.postings.iter_mut() {
            if let Some(&value) = idf.get(tid) {
                *slot = Some(value);
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn postings(&self, term_id: TermId) -> Result<Vec<Posting>, StoreError> {
        let t = self.tables.read();
        Ok(t.postings
            .range((term_id, DocId::MIN)..=(term_id, DocId::MAX))
            .map(|(&(term_id, doc_id), &(tf, idf))| Posting { term_id, doc_id, tf, idf })
            .collect())
    }

    fn document(&self, doc_id: DocId) -> Result<Option<DocMeta>, StoreError> {
        Ok(self.tables.read().documents.get(&doc_id).cloned())
    }

    fn replace_terms(&self, terms: &[(TermId, String)]) -> Result<(), StoreError> {
        self.tables.write().terms = terms.iter().cloned().collect();
        Ok(())
    }

    fn load_terms(&self) -> Result<Vec<(TermId, String)>, StoreError> {
        Ok(self.tables.read().terms.iter().map(|(&id, term)| (id, term.clone())).collect())
    }

    fn replace_suggestions(&self, grams: &[(String, u64)]) -> Result<(), StoreError> {
        self.tables.write().suggestions = grams.iter().cloned().collect();
        Ok(())
    }

    fn suggestions(&self) -> Result<Vec<(String, u64)>, StoreError> {
        Ok(self.tables.read().suggestions.iter().map(|(g, &c)| (g.clone(), c)).collect())
    }

    fn write_meta(&self, meta: &MetaFile) -> Result<(), StoreError> {
        self.tables.write().meta = Some(meta.clone());
        Ok(())
    }

    fn meta(&self) -> Result<Option<MetaFile>, StoreError> {
        Ok(self.tables.read().meta.clone())
    }

    fn compact(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
