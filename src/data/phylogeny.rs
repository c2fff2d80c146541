//! Rooted phylogenetic tree for phylogenetic diversity metrics.

use crate::error::{DivError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A node in the phylogeny (array-based representation).
#[derive(Debug, Clone)]
pub struct PhyloNode {
    /// Index of the parent node (root has parent = itself).
    pub parent: usize,
    /// Branch length from this node to its parent.
    pub branch_length: f64,
    /// Tip label (feature ID), or empty for internal nodes.
    pub label: String,
    /// Child indices.
    pub children: Vec<usize>,
}

/// A rooted phylogeny in array representation.
///
/// Tip labels are feature IDs; phylogenetic metrics require every feature
/// with nonzero abundance to appear as a tip.
#[derive(Debug, Clone)]
pub struct Phylogeny {
    nodes: Vec<PhyloNode>,
    root: usize,
    tip_index: HashMap<String, usize>,
}

impl Phylogeny {
    /// Parse a Newick-format tree string.
    ///
    /// Handles the subset of Newick produced by phylogenetic tools:
    /// `((A:0.1,B:0.2):0.3,(C:0.4,D:0.5):0.6)root;`
    pub fn from_newick(newick: &str) -> Result<Self> {
        let trimmed = newick.trim().trim_end_matches(';');
        if trimmed.is_empty() {
            return Err(DivError::EmptyData("Empty Newick string".to_string()));
        }

        let mut nodes = vec![PhyloNode {
            parent: 0,
            branch_length: 0.0,
            label: String::new(),
            children: Vec::new(),
        }];
        let root = 0;
        let mut stack: Vec<usize> = vec![root];

        let chars: Vec<char> = trimmed.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '(' => {
                    let parent = *stack.last().unwrap_or(&root);
                    let new_idx = nodes.len();
                    nodes.push(PhyloNode {
                        parent,
                        branch_length: 0.0,
                        label: String::new(),
                        children: Vec::new(),
                    });
                    nodes[parent].children.push(new_idx);
                    stack.push(new_idx);
                    i += 1;
                }
                ')' => {
                    let closed = stack.pop().ok_or_else(|| {
                        DivError::InvalidParameter("Unbalanced ')' in Newick string".to_string())
                    })?;
                    i += 1;
                    let (label, bl, consumed) = parse_label_length(&chars[i..]);
                    if consumed > 0 {
                        nodes[closed].label = label;
                        nodes[closed].branch_length = bl;
                        i += consumed;
                    }
                }
                ',' => {
                    i += 1;
                }
                _ => {
                    let (label, bl, consumed) = parse_label_length(&chars[i..]);
                    if consumed > 0 {
                        let parent = *stack.last().unwrap_or(&root);
                        let new_idx = nodes.len();
                        nodes.push(PhyloNode {
                            parent,
                            branch_length: bl,
                            label,
                            children: Vec::new(),
                        });
                        nodes[parent].children.push(new_idx);
                        i += consumed;
                    } else {
                        i += 1;
                    }
                }
            }
        }

        if stack.len() != 1 {
            return Err(DivError::InvalidParameter(
                "Unbalanced '(' in Newick string".to_string(),
            ));
        }

        let mut tip_index = HashMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            if node.children.is_empty() && !node.label.is_empty() {
                tip_index.insert(node.label.clone(), idx);
            }
        }

        Ok(Self {
            nodes,
            root,
            tip_index,
        })
    }

    /// Read a Newick tree from a file.
    pub fn from_newick_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_newick(&text)
    }

    /// All nodes.
    pub fn nodes(&self) -> &[PhyloNode] {
        &self.nodes
    }

    /// Index of the root node.
    pub fn root(&self) -> usize {
        self.root
    }

    /// Get the index of a tip by its label.
    pub fn tip(&self, label: &str) -> Option<usize> {
        self.tip_index.get(label).copied()
    }

    /// Number of tips.
    pub fn n_tips(&self) -> usize {
        self.tip_index.len()
    }

    /// Total branch length of the tree.
    pub fn total_branch_length(&self) -> f64 {
        self.nodes.iter().map(|n| n.branch_length).sum()
    }

    /// Verify that every given feature ID appears as a tip.
    ///
    /// Fails with [`DivError::TreeCoverage`] listing the missing IDs.
    pub fn check_coverage<'a, I>(&self, feature_ids: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let missing: Vec<String> = feature_ids
            .into_iter()
            .filter(|id| !self.tip_index.contains_key(*id))
            .map(|id| id.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DivError::TreeCoverage {
                feature_ids: missing,
            })
        }
    }

    /// Sum of branch lengths of the subtree spanning the root and the given
    /// tips (each edge counted once).
    ///
    /// Tips absent from the tree are ignored here; callers validate coverage
    /// separately so the error can name the offending feature IDs.
    pub fn spanning_branch_length(&self, tips: &[usize]) -> f64 {
        let mut on_path = vec![false; self.nodes.len()];
        for &tip in tips {
            let mut node = tip;
            while node != self.root && !on_path[node] {
                on_path[node] = true;
                node = self.nodes[node].parent;
            }
        }
        self.nodes
            .iter()
            .enumerate()
            .filter(|(idx, _)| on_path[*idx])
            .map(|(_, n)| n.branch_length)
            .sum()
    }
}

fn parse_label_length(chars: &[char]) -> (String, f64, usize) {
    let mut label = String::new();
    let mut bl_str = String::new();
    let mut i = 0;
    let mut in_length = false;

    while i < chars.len() {
        match chars[i] {
            '(' | ')' | ',' | ';' => break,
            ':' => {
                in_length = true;
                i += 1;
            }
            c => {
                if in_length {
                    bl_str.push(c);
                } else {
                    label.push(c);
                }
                i += 1;
            }
        }
    }

    let bl = bl_str.parse::<f64>().unwrap_or(0.0);
    (label, bl, i)
}
