//! Spatial neighbourhood of grid cells

use heatsense_core::model::AnalysisGrid;
use std::collections::HashMap;

/// Queen contiguity: cells sharing an edge or a vertex are neighbours
///
/// Derived from grid row/column indices, so clipped cells keep the
/// neighbours of their unclipped squares. Cells dropped during tiling leave
/// holes, and the relation may split into disconnected components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjacency {
    /// Sorted neighbour ids, indexed by cell id
    neighbors: Vec<Vec<u32>>,
}

impl Adjacency {
    pub fn queen(grid: &AnalysisGrid) -> Self {
        let index: HashMap<(u32, u32), u32> = grid
            .cells
            .iter()
            .map(|c| ((c.row, c.col), c.id))
            .collect();

        let neighbors = grid
            .cells
            .iter()
            .map(|cell| {
                let mut ids = Vec::with_capacity(8);
                for dr in -1i64..=1 {
                    for dc in -1i64..=1 {
                        if dr == 0 && dc == 0 {
                            continue;
                        }
                        let (r, c) = (cell.row as i64 + dr, cell.col as i64 + dc);
                        if r < 0 || c < 0 {
                            continue;
                        }
                        if let Some(&id) = index.get(&(r as u32, c as u32)) {
                            ids.push(id);
                        }
                    }
                }
                ids.sort_unstable();
                ids
            })
            .collect();

        Self { neighbors }
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn neighbors(&self, id: u32) -> &[u32] {
        self.neighbors
            .get(id as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn are_neighbors(&self, a: u32, b: u32) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }

    /// Number of undirected neighbour pairs
    pub fn pair_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum::<usize>() / 2
    }
}
