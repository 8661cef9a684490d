//! Round-robin index over candidate paths, bucketed by middlebox membership.
//!
//! Plain paths form a single bucket sorted by ascending length; middlebox
//! paths form one bucket per middlebox node, listing every path that
//! traverses it. Drawing alternates across buckets so no middlebox's paths
//! dominate the replacement candidates.

use std::collections::BTreeMap;

use crate::paths::Path;
use crate::score::length_order;
use crate::{NodeId, Result, SelectorError};

/// Cyclic bucket iterator. State is an explicit cursor pair: one cursor over
/// buckets, one per bucket, advanced in lock-step by [`PathTree::next_index`].
#[derive(Debug, Clone)]
pub struct PathTree {
    buckets: Vec<Bucket>,
    bucket_cursor: usize,
}

#[derive(Debug, Clone)]
struct Bucket {
    #[allow(dead_code)]
    key: NodeId,
    indices: Vec<usize>,
    cursor: usize,
}

impl PathTree {
    /// Build the index for one traffic class's candidate list. The list must
    /// be homogeneous: all plain or all middlebox paths.
    pub fn new(paths: &[Path]) -> Result<Self> {
        let num_mbox = paths.iter().filter(|p| p.mboxes().is_some()).count();
        if num_mbox != 0 && num_mbox != paths.len() {
            return Err(SelectorError::MixedPathKinds);
        }

        let buckets = if num_mbox == 0 {
            if paths.is_empty() {
                Vec::new()
            } else {
                vec![Bucket {
                    key: 0,
                    indices: length_order(paths),
                    cursor: 0,
                }]
            }
        } else {
            let mut by_mbox: BTreeMap<NodeId, Vec<usize>> = BTreeMap::new();
            for (i, path) in paths.iter().enumerate() {
                for mbox in path.mboxes().unwrap_or(&[]) {
                    by_mbox.entry(*mbox).or_default().push(i);
                }
            }
            by_mbox
                .into_iter()
                .map(|(key, indices)| Bucket {
                    key,
                    indices,
                    cursor: 0,
                })
                .collect()
        };

        Ok(Self {
            buckets,
            bucket_cursor: 0,
        })
    }

    /// Draw the next path index: pick the next bucket round-robin, then the
    /// next index within that bucket, wrapping cyclically. `None` only for an
    /// empty candidate list.
    pub fn next_index(&mut self) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        let b = self.bucket_cursor;
        self.bucket_cursor = (self.bucket_cursor + 1) % self.buckets.len();
        let bucket = &mut self.buckets[b];
        let idx = bucket.indices[bucket.cursor];
        bucket.cursor = (bucket.cursor + 1) % bucket.indices.len();
        Some(idx)
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }
}
