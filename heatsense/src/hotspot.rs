//! Heat hotspot detection
//!
//! A hotspot is a cell that is both locally autocorrelated with its
//! neighbours (local Moran's I, permutation p-value below the significance
//! level) and hotter than the configured percentile of all valid cells.
//! Candidates are grouped into spatially connected clusters and clusters
//! below the minimum size are discarded.

use crate::adjacency::Adjacency;
use crate::stats;
use heatsense_core::model::AnalysisGrid;
use heatsense_core::LogContext;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{NodeIndex, UnGraph};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

/// Local statistic and pseudo p-value of one location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalStatistic {
    pub local_i: f64,
    pub p_value: f64,
}

impl LocalStatistic {
    pub fn not_significant() -> Self {
        Self {
            local_i: 0.0,
            p_value: 1.0,
        }
    }
}

/// Local indicator of spatial association
///
/// `values[i]` is the temperature of location `i`; `neighbors[i]` lists
/// indices into `values`. Returns one statistic per location.
pub trait SignificanceTest: Send + Sync + Debug {
    fn local_statistics(&self, values: &[f64], neighbors: &[Vec<usize>]) -> Vec<LocalStatistic>;
}

/// Local Moran's I with conditional-permutation inference
#[derive(Debug, Clone)]
pub struct LocalMoran {
    pub permutations: usize,
    pub seed: u64,
    /// Locations per processing chunk
    pub chunk_size: usize,
}

impl LocalMoran {
    pub fn new(permutations: usize, seed: u64) -> Self {
        Self {
            permutations: permutations.max(1),
            seed,
            chunk_size: 1000,
        }
    }

    fn location(&self, i: usize, z: &[f64], neighbors: &[usize]) -> LocalStatistic {
        let k = neighbors.len();
        let n = z.len();
        if k == 0 || n < 2 {
            return LocalStatistic::not_significant();
        }

        let lag = neighbors.iter().map(|&j| z[j]).sum::<f64>() / k as f64;
        let observed = z[i] * lag;

        // Draw k values from the other n - 1 locations, holding i fixed
        let draw = k.min(n - 1);
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(i as u64));
        let mut larger = 0usize;
        for _ in 0..self.permutations {
            let sample = rand::seq::index::sample(&mut rng, n - 1, draw);
            let sum: f64 = sample
                .iter()
                .map(|j| if j >= i { z[j + 1] } else { z[j] })
                .sum();
            if z[i] * (sum / draw as f64) >= observed {
                larger += 1;
            }
        }

        let extreme = larger.min(self.permutations - larger);
        LocalStatistic {
            local_i: observed,
            p_value: (extreme + 1) as f64 / (self.permutations + 1) as f64,
        }
    }
}

impl SignificanceTest for LocalMoran {
    fn local_statistics(&self, values: &[f64], neighbors: &[Vec<usize>]) -> Vec<LocalStatistic> {
        let n = values.len();
        let (Some(mean), Some(std)) = (stats::mean(values), stats::population_std(values)) else {
            return Vec::new();
        };
        if std <= f64::EPSILON * mean.abs().max(1.0) {
            return vec![LocalStatistic::not_significant(); n];
        }
        let z: Vec<f64> = values.iter().map(|v| (v - mean) / std).collect();

        let mut out = Vec::with_capacity(n);
        let chunk_size = self.chunk_size.max(1);
        for (chunk_index, start) in (0..n).step_by(chunk_size).enumerate() {
            let end = (start + chunk_size).min(n);
            out.extend((start..end).map(|i| self.location(i, &z, &neighbors[i])));
            debug!(chunk = chunk_index, cells = end - start, "local moran chunk done");
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HotspotParams {
    /// Percentile in (0, 1) a candidate must exceed
    pub threshold: f64,
    pub significance_level: f64,
    pub min_cluster_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub cell_id: u32,
    pub cluster_id: u32,
    pub temperature: f64,
    pub local_i: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: u32,
    pub size: usize,
    pub mean_temperature: f64,
    pub max_temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HotspotReport {
    /// Kept hotspots ordered by cell id
    pub hotspots: Vec<Hotspot>,
    /// Kept clusters ordered by id
    pub clusters: Vec<ClusterSummary>,
    /// Temperature at the configured percentile; `None` without valid cells
    pub temperature_threshold: Option<f64>,
    pub candidate_count: usize,
    pub discarded_clusters: usize,
}

impl HotspotReport {
    pub fn is_empty(&self) -> bool {
        self.hotspots.is_empty()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }
}

#[derive(Debug, Clone)]
pub struct HotspotDetector {
    params: HotspotParams,
    test: Arc<dyn SignificanceTest>,
    log: LogContext,
}

impl HotspotDetector {
    pub fn new(params: HotspotParams, test: Arc<dyn SignificanceTest>, log: &LogContext) -> Self {
        Self {
            params,
            test,
            log: log.child("hotspots"),
        }
    }

    pub fn params(&self) -> &HotspotParams {
        &self.params
    }

    pub fn detect(&self, grid: &AnalysisGrid, adjacency: &Adjacency) -> HotspotReport {
        self.log.in_scope(|| self.detect_inner(grid, adjacency))
    }

    fn detect_inner(&self, grid: &AnalysisGrid, adjacency: &Adjacency) -> HotspotReport {
        let valid = grid.valid_temperatures();
        if valid.is_empty() {
            info!("no valid temperatures, no hotspots");
            return HotspotReport::default();
        }

        // Dense indices over valid cells only
        let dense: HashMap<u32, usize> = valid
            .iter()
            .enumerate()
            .map(|(i, &(id, _))| (id, i))
            .collect();
        let values: Vec<f64> = valid.iter().map(|&(_, t)| t).collect();
        let neighbors: Vec<Vec<usize>> = valid
            .iter()
            .map(|&(id, _)| {
                adjacency
                    .neighbors(id)
                    .iter()
                    .filter_map(|n| dense.get(n).copied())
                    .collect()
            })
            .collect();

        let statistics = self.test.local_statistics(&values, &neighbors);
        let threshold = stats::quantile(&values, self.params.threshold);

        let candidates: Vec<usize> = (0..values.len())
            .filter(|&i| {
                let significant = statistics
                    .get(i)
                    .map_or(false, |s| s.p_value < self.params.significance_level);
                significant && threshold.map_or(false, |t| values[i] > t)
            })
            .collect();

        if candidates.is_empty() {
            info!(threshold = ?threshold, "no hotspot candidates");
            return HotspotReport {
                temperature_threshold: threshold,
                ..HotspotReport::default()
            };
        }

        let mut graph: UnGraph<usize, ()> = UnGraph::with_capacity(candidates.len(), 0);
        let nodes: HashMap<usize, NodeIndex> = candidates
            .iter()
            .map(|&i| (i, graph.add_node(i)))
            .collect();
        for &i in &candidates {
            for j in &neighbors[i] {
                // Each undirected pair once
                if *j > i {
                    if let Some(&nj) = nodes.get(j) {
                        graph.add_edge(nodes[&i], nj, ());
                    }
                }
            }
        }

        let mut components: Vec<Vec<u32>> = kosaraju_scc(&graph)
            .into_iter()
            .map(|component| {
                let mut ids: Vec<u32> = component.iter().map(|&n| valid[graph[n]].0).collect();
                ids.sort_unstable();
                ids
            })
            .collect();
        components.sort_by_key(|ids| ids[0]);

        let mut hotspots = Vec::new();
        let mut clusters = Vec::new();
        let mut discarded = 0;
        for (cluster_id, ids) in components.iter().enumerate() {
            let cluster_id = cluster_id as u32;
            if ids.len() < self.params.min_cluster_size {
                discarded += 1;
                continue;
            }
            let temps: Vec<f64> = ids.iter().map(|id| values[dense[id]]).collect();
            clusters.push(ClusterSummary {
                id: cluster_id,
                size: ids.len(),
                mean_temperature: stats::mean(&temps).unwrap_or(f64::NAN),
                max_temperature: temps.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            });
            for id in ids {
                let i = dense[id];
                let stat = statistics[i];
                hotspots.push(Hotspot {
                    cell_id: *id,
                    cluster_id,
                    temperature: values[i],
                    local_i: stat.local_i,
                    p_value: stat.p_value,
                });
            }
        }
        hotspots.sort_by_key(|h| h.cell_id);

        info!(
            candidates = candidates.len(),
            hotspots = hotspots.len(),
            clusters = clusters.len(),
            discarded,
            "hotspot detection finished"
        );

        HotspotReport {
            hotspots,
            clusters,
            temperature_threshold: threshold,
            candidate_count: candidates.len(),
            discarded_clusters: discarded,
        }
    }
}
