use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tree::Tree;

/// Padding id for positions not covered by the tree.
pub const VOID: u32 = 0;
/// Id for t-lemmas never seen during dictionary initialization.
pub const UNK_T_LEMMA: u32 = 1;
/// Id for formemes never seen during dictionary initialization.
pub const UNK_FORMEME: u32 = 2;
/// First id handed out to a real t-lemma or formeme.
pub const MIN_VALID: u32 = 3;

/// Turns a tree into a fixed-length sequence of ids, one (formeme, t-lemma) pair
/// per node, disregarding the tree structure.
///
/// t-lemmas and formemes share one id space so the sequence can index a single
/// embedding table. The dictionary only grows through [`init_dict`](Self::init_dict);
/// looking up a tree never changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEmbeddingExtractor {
    dict_t_lemma: HashMap<String, u32>,
    dict_formeme: HashMap<String, u32>,
    max_tree_len: usize,
    next_id: u32,
}

impl TreeEmbeddingExtractor {
    pub fn new(max_tree_len: usize) -> Self {
        let mut dict_t_lemma = HashMap::new();
        dict_t_lemma.insert("UNK_T_LEMMA".to_string(), UNK_T_LEMMA);
        let mut dict_formeme = HashMap::new();
        dict_formeme.insert("UNK_FORMEME".to_string(), UNK_FORMEME);
        Self {
            dict_t_lemma,
            dict_formeme,
            max_tree_len,
            next_id: MIN_VALID,
        }
    }

    /// Assigns ids to every t-lemma and formeme not yet in the dictionary, in the order
    /// they are encountered (trees in input order, nodes in tree order).
    ///
    /// Returns the lowest id still available, which is also the number of rows an
    /// embedding table indexed by these ids needs. Ids already assigned never change.
    pub fn init_dict(&mut self, trees: &[Tree]) -> u32 {
        for tree in trees {
            for node in tree.nodes() {
                if !self.dict_t_lemma.contains_key(&node.t_lemma) {
                    self.dict_t_lemma.insert(node.t_lemma.clone(), self.next_id);
                    self.next_id += 1;
                }
                if !self.dict_formeme.contains_key(&node.formeme) {
                    self.dict_formeme.insert(node.formeme.clone(), self.next_id);
                    self.next_id += 1;
                }
            }
        }
        self.next_id
    }

    /// The id sequence for a tree: `[formeme, t_lemma]` for each of the first
    /// `max_tree_len` nodes, left-padded with [`VOID`] to exactly `2 * max_tree_len` ids.
    pub fn get_embeddings(&self, tree: &Tree) -> Vec<u32> {
        let width = self.max_tree_len * 2;
        let used = tree.len().min(self.max_tree_len);
        let mut embs = vec![VOID; width - used * 2];
        embs.reserve(used * 2);
        for node in &tree.nodes()[..used] {
            embs.push(*self.dict_formeme.get(&node.formeme).unwrap_or(&UNK_FORMEME));
            embs.push(*self.dict_t_lemma.get(&node.t_lemma).unwrap_or(&UNK_T_LEMMA));
        }
        embs
    }

    /// Shape of one embedded tree, disregarding batches.
    pub fn get_embeddings_shape(&self) -> Vec<usize> {
        vec![self.max_tree_len * 2]
    }

    /// Number of ids assigned so far, including the reserved ones.
    pub fn dict_size(&self) -> usize {
        self.next_id as usize
    }

    pub fn max_tree_len(&self) -> usize {
        self.max_tree_len
    }

    pub fn t_lemma_id(&self, t_lemma: &str) -> Option<u32> {
        self.dict_t_lemma.get(t_lemma).copied()
    }

    pub fn formeme_id(&self, formeme: &str) -> Option<u32> {
        self.dict_formeme.get(formeme).copied()
    }
}
