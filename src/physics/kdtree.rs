//! Static 2D k-d tree for nearest-sample queries
//!
//! The tree is implicit: sample indices are permuted in place so that, for
//! every sub-range `[lo, hi)`, the median element `mid = (lo + hi) / 2` is the
//! splitting node and the two halves are its subtrees. Splitting alternates
//! between x (even depth) and y (odd depth). No node allocation, no pointers.
//!
//! Ties in distance resolve to the lowest original sample index, so queries
//! are deterministic regardless of build order.

use nalgebra::Vector2;

/// Immutable spatial index over a fixed set of 2D points.
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<Vector2<f64>>,
    /// Original indices, permuted into implicit-tree order.
    order: Vec<usize>,
}

impl KdTree {
    /// Build the tree. `O(n log n)`.
    pub fn build(points: Vec<Vector2<f64>>) -> Self {
        let mut order: Vec<usize> = (0..points.len()).collect();
        build_range(&points, &mut order, 0);
        Self { points, order }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point stored under original index `index`.
    pub fn point(&self, index: usize) -> Vector2<f64> {
        self.points[index]
    }

    pub fn points(&self) -> &[Vector2<f64>] {
        &self.points
    }

    /// Original index of the sample nearest to `query`, `None` if empty.
    pub fn nearest(&self, query: &Vector2<f64>) -> Option<usize> {
        if self.order.is_empty() {
            return None;
        }
        let mut best = Best {
            index: usize::MAX,
            distance_sq: f64::INFINITY,
        };
        self.search(query, 0, self.order.len(), 0, &mut best);
        Some(best.index)
    }

    fn search(&self, query: &Vector2<f64>, lo: usize, hi: usize, depth: usize, best: &mut Best) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let index = self.order[mid];
        let node = self.points[index];

        best.offer(index, (node - query).norm_squared());

        let axis = depth % 2;
        let delta = query[axis] - node[axis];
        let (near, far) = if delta < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };

        self.search(query, near.0, near.1, depth + 1, best);
        // `<=` keeps equal-distance candidates on the far side reachable for
        // the lowest-index tie-break.
        if delta * delta <= best.distance_sq {
            self.search(query, far.0, far.1, depth + 1, best);
        }
    }
}

struct Best {
    index: usize,
    distance_sq: f64,
}

impl Best {
    #[inline]
    fn offer(&mut self, index: usize, distance_sq: f64) {
        if distance_sq < self.distance_sq || (distance_sq == self.distance_sq && index < self.index) {
            self.index = index;
            self.distance_sq = distance_sq;
        }
    }
}

fn build_range(points: &[Vector2<f64>], order: &mut [usize], depth: usize) {
    if order.len() <= 1 {
        return;
    }
    let axis = depth % 2;
    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&a, &b| points[a][axis].total_cmp(&points[b][axis]));
    let (left, rest) = order.split_at_mut(mid);
    build_range(points, left, depth + 1);
    build_range(points, &mut rest[1..], depth + 1);
}
