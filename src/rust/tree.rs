use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierError;

/// A single tree node: the lexical head (t-lemma) and its shallow syntactic role (formeme).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeNode {
    pub t_lemma: String,
    pub formeme: String,
}

impl TreeNode {
    pub fn new(t_lemma: impl Into<String>, formeme: impl Into<String>) -> Self {
        Self {
            t_lemma: t_lemma.into(),
            formeme: formeme.into(),
        }
    }
}

/// A dependency tree flattened to its nodes in surface order.
///
/// Only the node sequence matters to the classifier, so the tree structure itself
/// (parent links) is not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// The tree with no nodes, used as the "covers nothing" training instance.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a tree from `(t_lemma, formeme)` pairs.
    ///
    /// # Example
    /// ```
    /// use treeclassif::Tree;
    ///
    /// let tree = Tree::from_pairs(&[("restaurant", "n:subj"), ("be", "v:fin")]);
    /// assert_eq!(tree.len(), 2);
    /// ```
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            nodes: pairs.iter().map(|(l, f)| TreeNode::new(*l, *f)).collect(),
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, node: TreeNode) {
        self.nodes.push(node);
    }
}

impl FromStr for Tree {
    type Err = ClassifierError;

    /// Parses the one-line form: whitespace-separated `lemma|formeme` tokens.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let nodes = s
            .split_whitespace()
            .map(|token| {
                token
                    .rsplit_once('|')
                    .filter(|(lemma, formeme)| !lemma.is_empty() && !formeme.is_empty())
                    .map(|(lemma, formeme)| TreeNode::new(lemma, formeme))
                    .ok_or_else(|| {
                        ClassifierError::Parse(format!("Invalid tree node '{}' (expected lemma|formeme)", token))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { nodes })
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self
            .nodes
            .iter()
            .map(|n| format!("{}|{}", n.t_lemma, n.formeme))
            .collect();
        write!(f, "{}", tokens.join(" "))
    }
}
