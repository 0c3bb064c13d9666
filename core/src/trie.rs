//! Character trie for autocomplete.
//!
//! Nodes live in a flat arena and refer to each other by index. Every node
//! caches the `top_n` most frequent words of its subtree, so a lookup is a walk
//! down the prefix followed by returning that cached list unchanged.
//!
//! The two lifecycle states are two types: [`TrieBuilder`] accepts insertions,
//! [`TrieBuilder::finalize`] consumes it and yields a read-only [`Trie`].

use std::cmp::Ordering;
use std::time::Instant;

#[derive(Debug, Default)]
struct Node {
    /// Children sorted by character.
    children: Vec<(char, u32)>,
    /// Entry terminating at this node.
    entry: Option<u32>,
    /// Cached best entries of the subtree; empty until finalized.
    top: Vec<u32>,
}

#[derive(Debug)]
struct Entry {
    word: String,
    count: u64,
}

#[derive(Debug)]
pub struct TrieBuilder {
    nodes: Vec<Node>,
    entries: Vec<Entry>,
}

impl Default for TrieBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrieBuilder {
    pub fn new() -> Self {
        Self { nodes: vec![Node::default()], entries: Vec::new() }
    }

    /// Count one occurrence of `word`. Empty words are ignored.
    pub fn insert(&mut self, word: &str) {
        self.insert_weighted(word, 1);
    }

    /// Same as calling [`TrieBuilder::insert`] `count` times.
    pub fn insert_weighted(&mut self, word: &str, count: u64) {
        if word.is_empty() || count == 0 {
            return;
        }
        let mut idx = 0usize;
        for c in word.chars() {
            idx = self.child_or_create(idx, c);
        }
        match self.nodes[idx].entry {
            Some(e) => self.entries[e as usize].count += count,
            None => {
                self.nodes[idx].entry = Some(self.entries.len() as u32);
                self.entries.push(Entry { word: word.to_owned(), count });
            }
        }
    }

    fn child_or_create(&mut self, idx: usize, c: char) -> usize {
        match self.nodes[idx].children.binary_search_by_key(&c, |&(ch, _)| ch) {
            Ok(pos) => self.nodes[idx].children[pos].1 as usize,
            Err(pos) => {
                let child = self.nodes.len() as u32;
                self.nodes.push(Node::default());
                self.nodes[idx].children.insert(pos, (c, child));
                child as usize
            }
        }
    }

    /// Compute every node's cached top list and freeze the trie.
    ///
    /// A child is always allocated after its parent, so walking the arena from
    /// the last index to the first visits children before parents.
    pub fn finalize(mut self, top_n: usize) -> Trie {
        let start = Instant::now();
        let entries = &self.entries;
        for idx in (0..self.nodes.len()).rev() {
            let node = &self.nodes[idx];
            let mut candidates: Vec<u32> = node.entry.into_iter().collect();
            for &(_, child) in &node.children {
                candidates.extend_from_slice(&self.nodes[child as usize].top);
            }
            candidates.sort_by(|&a, &b| rank(&entries[a as usize], &entries[b as usize]));
            candidates.truncate(top_n);
            self.nodes[idx].top = candidates;
        }
        tracing::info!(
            nodes = self.nodes.len(),
            words = self.entries.len(),
            top_n,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "trie cache populated"
        );
        Trie { nodes: self.nodes, entries: self.entries, top_n }
    }
}

/// Higher count first; equal counts fall back to the word, ascending.
fn rank(a: &Entry, b: &Entry) -> Ordering {
    b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word))
}

/// Finalized, read-only autocomplete trie.
#[derive(Debug)]
pub struct Trie {
    nodes: Vec<Node>,
    entries: Vec<Entry>,
    top_n: usize,
}

impl Trie {
    /// Insert every word of the stream, then finalize.
    pub fn build<I, S>(words: I, top_n: usize) -> Trie
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = TrieBuilder::new();
        for word in words {
            builder.insert(word.as_ref());
        }
        builder.finalize(top_n)
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, prefix: &str) -> Option<&Node> {
        let mut node = &self.nodes[0];
        for c in prefix.chars() {
            let pos = node.children.binary_search_by_key(&c, |&(ch, _)| ch).ok()?;
            node = &self.nodes[node.children[pos].1 as usize];
        }
        Some(node)
    }

    /// Cached completions of `prefix`, most frequent first.
    pub fn suggest(&self, prefix: &str) -> Vec<&str> {
        self.suggest_with_counts(prefix).into_iter().map(|(w, _)| w).collect()
    }

    pub fn suggest_with_counts(&self, prefix: &str) -> Vec<(&str, u64)> {
        match self.find(prefix) {
            Some(node) => node
                .top
                .iter()
                .map(|&e| {
                    let entry = &self.entries[e as usize];
                    (entry.word.as_str(), entry.count)
                })
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_prefix_is_empty() {
        let trie = Trie::build(["cat", "car"], 5);
        assert!(trie.suggest("dog").is_empty());
        assert!(trie.suggest("cats").is_empty());
    }

    #[test]
    fn repeated_word_accumulates() {
        let trie = Trie::build(["cat"; 4], 1);
        assert_eq!(trie.suggest_with_counts("c"), vec![("cat", 4)]);
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn cached_list_is_bounded_and_sorted() {
        let words = ["car", "car", "car", "cat", "cat", "cab", "cart", "cart", "cart", "cart", "dog"];
        let trie = Trie::build(words, 3);
        let got = trie.suggest_with_counts("ca");
        assert_eq!(got, vec![("cart", 4), ("car", 3), ("cat", 2)]);
        assert!(got.windows(2).all(|w| w[0].1 >= w[1].1));
        assert_eq!(trie.suggest("car"), vec!["cart", "car"]);
    }

    #[test]
    fn equal_counts_order_by_word() {
        let trie = Trie::build(["beta", "alpha", "gamma"], 10);
        assert_eq!(trie.suggest(""), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn weighted_insert_matches_repeats() {
        let mut builder = TrieBuilder::new();
        builder.insert_weighted("new york", 3);
        builder.insert("new");
        builder.insert_weighted("newt", 0);
        builder.insert("");
        let trie = builder.finalize(10);
        assert_eq!(trie.suggest_with_counts("new"), vec![("new york", 3), ("new", 1)]);
        assert!(trie.suggest("newt").is_empty());
    }

    #[test]
    fn zero_top_n_caches_nothing() {
        let trie = Trie::build(["cat"], 0);
        assert!(trie.suggest("c").is_empty());
    }

    #[test]
    fn walks_by_character_not_byte() {
        let trie = Trie::build(["über", "übel", "über"], 5);
        assert_eq!(trie.suggest("üb"), vec!["über", "übel"]);
        assert_eq!(trie.suggest("ü"), vec!["über", "übel"]);
    }
}
