//! Hierarchical navigable small-world graph over raw f32 vectors.
//!
//! Greedy descent through the upper layers, beam search at layer 0, and
//! diversity-pruned neighbor selection during construction. Vectors are
//! L2-normalized before insertion, so cosine distance reduces to
//! `1 - dot(a, b)`.

use crate::visited::VisitedSet;
use cvrank_core::traits::dot;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HnswParams {
    /// Bidirectional links per node above layer 0.
    pub m: usize,
    /// Link cap at layer 0, conventionally `2 * m`.
    pub m_max0: usize,
    /// Beam width during construction.
    pub ef_construction: usize,
    /// Beam width during search.
    pub ef_search: usize,
    pub max_layers: usize,
    /// Seed for layer assignment, so rebuilding from the same input
    /// produces the same graph.
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            m_max0: 32,
            ef_construction: 200,
            ef_search: 64,
            max_layers: 16,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswIndex {
    pub params: HnswParams,
    pub dim: usize,
    vectors: Vec<f32>,
    /// `[node][layer][neighbor_ids]`
    neighbors: Vec<Vec<Vec<u32>>>,
    levels: Vec<u8>,
    entry_point: Option<u32>,
    max_layer: usize,
    count: u32,
}

impl HnswIndex {
    pub fn new(dim: usize, params: HnswParams) -> Self {
        Self {
            params,
            dim,
            vectors: Vec::new(),
            neighbors: Vec::new(),
            levels: Vec::new(),
            entry_point: None,
            max_layer: 0,
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn vector(&self, id: u32) -> &[f32] {
        let i = id as usize * self.dim;
        &self.vectors[i..i + self.dim]
    }

    #[inline]
    fn distance(&self, query: &[f32], id: u32) -> f32 {
        1.0 - dot(query, self.vector(id))
    }

    /// Exponentially distributed layer assignment, drawn from the seed and
    /// the node id so construction is reproducible.
    fn random_level(&self, id: u32) -> usize {
        let ml = 1.0 / (self.params.m as f64).ln();
        let mut rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(id as u64));
        let r: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
        let level = (-r.ln() * ml).floor() as usize;
        level.min(self.params.max_layers - 1)
    }

    /// Inserts an already-normalized vector, returning its internal id.
    pub fn insert(&mut self, vector: &[f32]) -> u32 {
        debug_assert_eq!(vector.len(), self.dim);
        let id = self.count;
        let level = self.random_level(id);

        self.vectors.extend_from_slice(vector);
        self.levels.push(level as u8);
        self.count += 1;

        let Some(entry) = self.entry_point else {
            self.neighbors.push(vec![Vec::new(); level + 1]);
            self.entry_point = Some(id);
            self.max_layer = level;
            return id;
        };

        let mut visited = VisitedSet::new(self.count as usize);
        let mut current_ep = entry;

        // Greedy descent to one layer above the node's level.
        for layer in (level + 1..=self.max_layer).rev() {
            let found = self.search_layer(vector, &[current_ep], 1, layer, &mut visited);
            if let Some(&(_, nearest)) = found.first() {
                current_ep = nearest;
            }
        }

        // Beam search on each layer the node participates in, collecting
        // its neighbor lists before wiring back-links.
        let top = level.min(self.max_layer);
        let mut node_neighbors: Vec<Vec<u32>> = vec![Vec::new(); level + 1];
        let mut layer_eps = vec![current_ep];
        for layer in (0..=top).rev() {
            let candidates = self.search_layer(
                vector,
                &layer_eps,
                self.params.ef_construction,
                layer,
                &mut visited,
            );
            let m_max = self.link_cap(layer);
            node_neighbors[layer] = self
                .select_diverse(&candidates, m_max)
                .into_iter()
                .map(|(_, nid)| nid)
                .collect();

            layer_eps.clear();
            layer_eps.extend(candidates.iter().map(|&(_, nid)| nid));
            if layer_eps.is_empty() {
                layer_eps.push(entry);
            }
        }
        self.neighbors.push(node_neighbors);

        // Back-links, pruning any neighbor that overflows its cap.
        for layer in 0..=top {
            let m_max = self.link_cap(layer);
            let links = self.neighbors[id as usize][layer].clone();
            for nid in links {
                self.neighbors[nid as usize][layer].push(id);
                if self.neighbors[nid as usize][layer].len() > m_max {
                    self.prune_links(nid, layer, m_max);
                }
            }
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(id);
        }
        id
    }

    fn link_cap(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.m_max0
        } else {
            self.params.m
        }
    }

    fn prune_links(&mut self, node: u32, layer: usize, m_max: usize) {
        let base = self.vector(node).to_vec();
        let mut scored: Vec<(f32, u32)> = self.neighbors[node as usize][layer]
            .iter()
            .map(|&nid| (self.distance(&base, nid), nid))
            .collect();
        scored.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
        let kept = self.select_diverse(&scored, m_max);
        self.neighbors[node as usize][layer] = kept.into_iter().map(|(_, nid)| nid).collect();
    }

    /// Heuristic neighbor selection (Algorithm 4): a candidate is kept only
    /// when it sits closer to the query than to every neighbor already
    /// selected, which spreads links across directions instead of
    /// clustering them.
    fn select_diverse(&self, candidates: &[(f32, u32)], m_max: usize) -> Vec<(f32, u32)> {
        let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m_max);
        for &(dist, id) in candidates {
            if selected.len() >= m_max {
                break;
            }
            let candidate_vec = self.vector(id);
            let diverse = selected
                .iter()
                .all(|&(_, sid)| self.distance(candidate_vec, sid) >= dist);
            if diverse {
                selected.push((dist, id));
            }
        }
        selected
    }

    /// Beam search within one layer. Returns up to `ef` nodes sorted by
    /// ascending distance.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[u32],
        ef: usize,
        layer: usize,
        visited: &mut VisitedSet,
    ) -> Vec<(f32, u32)> {
        visited.clear();
        visited.ensure_capacity(self.count as usize);

        // candidates: min-heap by distance; results: max-heap for pruning.
        let mut candidates: BinaryHeap<Reverse<(OrderedFloat<f32>, u32)>> = BinaryHeap::new();
        let mut results: BinaryHeap<(OrderedFloat<f32>, u32)> = BinaryHeap::new();

        for &ep in entry_points {
            if visited.insert(ep) {
                let d = self.distance(query, ep);
                candidates.push(Reverse((OrderedFloat(d), ep)));
                results.push((OrderedFloat(d), ep));
            }
        }
        while results.len() > ef {
            results.pop();
        }

        while let Some(Reverse((OrderedFloat(c_dist), c_id))) = candidates.pop() {
            let worst = results.peek().map_or(f32::MAX, |r| r.0 .0);
            if c_dist > worst && results.len() >= ef {
                break;
            }
            if layer < self.neighbors[c_id as usize].len() {
                for &nid in &self.neighbors[c_id as usize][layer] {
                    if !visited.insert(nid) {
                        continue;
                    }
                    let d = self.distance(query, nid);
                    let worst = results.peek().map_or(f32::MAX, |r| r.0 .0);
                    if results.len() < ef || d < worst {
                        candidates.push(Reverse((OrderedFloat(d), nid)));
                        results.push((OrderedFloat(d), nid));
                        if results.len() > ef {
                            results.pop();
                        }
                    }
                }
            }
        }

        let mut out: Vec<(f32, u32)> = results
            .into_iter()
            .map(|(OrderedFloat(d), id)| (d, id))
            .collect();
        out.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
        out
    }

    /// Top-k nearest by cosine similarity, descending. Returns at most `k`
    /// entries.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(u32, f32)> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };
        let mut visited = VisitedSet::new(self.count as usize);
        let mut current_ep = entry;
        for layer in (1..=self.max_layer).rev() {
            let found = self.search_layer(query, &[current_ep], 1, layer, &mut visited);
            if let Some(&(_, nearest)) = found.first() {
                current_ep = nearest;
            }
        }
        let ef = self.params.ef_search.max(k);
        let found = self.search_layer(query, &[current_ep], ef, 0, &mut visited);
        found
            .into_iter()
            .take(k)
            .map(|(d, id)| (id, 1.0 - d))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvrank_core::traits::l2_normalize;

    fn unit(v: &[f32]) -> Vec<f32> {
        let mut v = v.to_vec();
        l2_normalize(&mut v);
        v
    }

    #[test]
    fn single_vector_is_found() {
        let mut idx = HnswIndex::new(3, HnswParams::default());
        let v = unit(&[0.2, 0.4, 0.9]);
        idx.insert(&v);
        let hits = idx.search(&v, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 0);
        assert!((hits[0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn nearest_neighbor_is_exact_on_small_sets() {
        let mut idx = HnswIndex::new(4, HnswParams::default());
        let vecs: Vec<Vec<f32>> = (0..50)
            .map(|i| {
                let f = i as f32;
                unit(&[f.sin(), f.cos(), (f * 0.3).sin(), 1.0])
            })
            .collect();
        for v in &vecs {
            idx.insert(v);
        }
        // With ef >> n the beam covers the whole graph, so the top hit must
        // match a brute-force scan.
        for (qi, q) in vecs.iter().enumerate().step_by(7) {
            let hits = idx.search(q, 1);
            assert_eq!(hits[0].0 as usize, qi);
        }
    }

    #[test]
    fn construction_is_reproducible_for_a_fixed_seed() {
        let build = || {
            let mut idx = HnswIndex::new(4, HnswParams::default());
            for i in 0..40 {
                let f = i as f32;
                idx.insert(&unit(&[f.sin(), f.cos(), (f * 0.7).sin(), 1.0]));
            }
            idx
        };
        let a = serde_json::to_string(&build()).expect("serialize");
        let b = serde_json::to_string(&build()).expect("serialize");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let idx = HnswIndex::new(3, HnswParams::default());
        assert!(idx.search(&[1.0, 0.0, 0.0], 3).is_empty());
    }
}
