//! Content-addressable deduplication analysis.
//!
//! Every image contributes two hash chains. Each node hashes the previous
//! node together with one step, so two images produce the same node exactly
//! when they are identical up to and including that step:
//!
//! - the history chain covers build steps (command, creation time, size),
//!   rooted at the base image;
//! - the layer chain covers root filesystem layer digests, oldest first.
//!
//! The real disk usage of a set of images is the sum of the sizes of the
//! distinct history nodes, since a layered store keeps shared steps once.

use crate::store::HistoryEntry;
use serde::Serialize;
use sha2::{Digest as _, Sha256};
use std::collections::{BTreeSet, HashMap, HashSet};


#[derive(Debug, Clone)]
struct HistoryNode {
    entry: HistoryEntry,
    users: BTreeSet<String>,
}

/// Reuse figures for one kind of chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReuseStats {
    /// Distinct chain nodes
    pub nodes: usize,
    /// Distinct nodes used by two or more images
    pub shared_nodes: usize,
    /// Usage events: a shared node counts once per image using it, any other node once
    pub total: usize,
    /// Usage events of shared nodes
    pub shared: usize,
}

impl ReuseStats {
    fn from_usage<'a>(usages: impl Iterator<Item = &'a BTreeSet<String>>) -> Self {
        let mut stats = Self::default();
        for users in usages {
            stats.nodes += 1;
            if users.len() > 1 {
                stats.shared_nodes += 1;
                stats.shared += users.len();
                stats.total += users.len();
            } else {
                stats.total += 1;
            }
        }
        stats
    }

    /// Fraction of usage events that hit a shared node, 0 when nothing was analyzed.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.shared as f64 / self.total as f64
        }
    }

    /// Reuse percentage rounded to one decimal.
    pub fn percent(&self) -> f64 {
        (self.ratio() * 1000.0).round() / 10.0
    }
}

/// Accumulates hash chains of many images.
#[derive(Debug, Default)]
pub struct DedupAnalyzer {
    history_nodes: HashMap<String, HistoryNode>,
    layer_nodes: HashMap<String, BTreeSet<String>>,
    image_history: HashMap<String, Vec<String>>,
    layer_roots: HashSet<String>,
}

fn chain_hash(previous: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous.as_bytes());
    for part in parts {
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

impl DedupAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an image's build history, given most recent step first as the
    /// local store reports it.
    ///
    /// An image accumulated twice is still counted once per node.
    pub fn accumulate_history(&mut self, image: &str, history: &[HistoryEntry]) {
        let mut previous = String::new();
        let mut hashes = Vec::with_capacity(history.len());

        for entry in history.iter().rev() {
            let hash = chain_hash(
                &previous,
                &[
                    entry.created_by.as_str(),
                    entry.created_at.as_str(),
                    entry.size.as_str(),
                ],
            );
            self.history_nodes
                .entry(hash.clone())
                .or_insert_with(|| HistoryNode {
                    entry: entry.clone(),
                    users: BTreeSet::new(),
                })
                .users
                .insert(image.to_string());
            hashes.push(hash.clone());
            previous = hash;
        }

        self.image_history.insert(image.to_string(), hashes);
    }

    /// Adds an image's layer digests, oldest first.
    pub fn accumulate_layers(&mut self, image: &str, layers: &[String]) {
        let mut previous = String::new();
        for layer in layers {
            let hash = chain_hash(&previous, &[layer.as_str()]);
            if previous.is_empty() {
                self.layer_roots.insert(hash.clone());
            }
            self.layer_nodes
                .entry(hash.clone())
                .or_default()
                .insert(image.to_string());
            previous = hash;
        }
    }

    /// Adds both chains of one image.
    pub fn accumulate(&mut self, image: &str, layers: &[String], history: &[HistoryEntry]) {
        self.accumulate_layers(image, layers);
        self.accumulate_history(image, history);
    }

    /// Sum of the sizes of distinct history nodes.
    pub fn total_real_bytes(&self) -> u64 {
        self.history_nodes
            .values()
            .map(|node| node.entry.size_bytes())
            .sum()
    }

    pub fn history_reuse(&self) -> ReuseStats {
        ReuseStats::from_usage(self.history_nodes.values().map(|node| &node.users))
    }

    pub fn layer_reuse(&self) -> ReuseStats {
        ReuseStats::from_usage(self.layer_nodes.values())
    }

    /// Number of distinct base layers.
    pub fn unique_base_images(&self) -> usize {
        self.layer_roots.len()
    }

    /// Bytes of `image`'s build steps that at least one other image shares.
    pub fn shared_bytes_for(&self, image: &str) -> u64 {
        self.image_history
            .get(image)
            .into_iter()
            .flatten()
            .filter_map(|hash| self.history_nodes.get(hash))
            .filter(|node| node.users.len() > 1)
            .map(|node| node.entry.size_bytes())
            .sum()
    }

    /// Number of images whose history was analyzed.
    pub fn image_count(&self) -> usize {
        self.image_history.len()
    }
}
