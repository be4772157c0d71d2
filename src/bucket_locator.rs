use itertools::Itertools;

use crate::geometry::{self, Projection, Simplex};
use crate::point_locator::{Location, PointLocator};

/// A point locator based on a uniform grid of buckets.
///
/// Each bucket stores the simplices whose bounding box overlaps it, so that locating a point
/// only requires testing the few simplices of the bucket it falls in.
#[derive(Debug)]
pub struct BucketLocator {
    simplices: Vec<Simplex>,
    origin: [f64; 3],
    size: [f64; 3],
    counts: [usize; 3],
    buckets: Vec<Vec<usize>>,
}

fn simplex_bounds(simplex: &Simplex) -> ([f64; 3], [f64; 3]) {
    let mut mins = [f64::MAX; 3];
    let mut maxs = [f64::MIN; 3];
    for vertex in simplex {
        for axis in 0..3 {
            mins[axis] = mins[axis].min(vertex[axis]);
            maxs[axis] = maxs[axis].max(vertex[axis]);
        }
    }
    (mins, maxs)
}

impl BucketLocator {
    /// Constructs a new `BucketLocator` over the given simplices.
    ///
    /// The number of buckets is of the order of the number of simplices.
    pub fn new(simplices: Vec<Simplex>) -> Self {
        let bounds: Vec<_> = simplices.iter().map(simplex_bounds).collect();
        let mut origin = [f64::MAX; 3];
        let mut upper = [f64::MIN; 3];
        for (mins, maxs) in &bounds {
            for axis in 0..3 {
                origin[axis] = origin[axis].min(mins[axis]);
                upper[axis] = upper[axis].max(maxs[axis]);
            }
        }
        if simplices.is_empty() {
            origin = [0.; 3];
            upper = [0.; 3];
        }

        let extent = [0, 1, 2].map(|axis| upper[axis] - origin[axis]);
        let active = extent.iter().filter(|&&e| e > 0.).count().max(1);
        let per_axis = (simplices.len() as f64).powf(1. / active as f64).ceil() as usize;
        let counts = extent.map(|e| if e > 0. { per_axis.clamp(1, 1024) } else { 1 });
        let size = [0, 1, 2].map(|axis| {
            if extent[axis] > 0. {
                extent[axis] / counts[axis] as f64
            } else {
                1.
            }
        });

        let mut locator = Self {
            simplices,
            origin,
            size,
            counts,
            buckets: vec![Vec::new(); counts.iter().product()],
        };
        for (idx, (mins, maxs)) in bounds.iter().enumerate() {
            let lo = locator.bucket_coords(mins);
            let hi = locator.bucket_coords(maxs);
            for ((k, j), i) in (lo[2]..=hi[2])
                .cartesian_product(lo[1]..=hi[1])
                .cartesian_product(lo[0]..=hi[0])
            {
                let bucket = locator.bucket_index([i, j, k]);
                locator.buckets[bucket].push(idx);
            }
        }
        locator
    }

    pub fn simplex_count(&self) -> usize {
        self.simplices.len()
    }

    pub(crate) fn simplex(&self, idx: usize) -> &Simplex {
        &self.simplices[idx]
    }

    fn bucket_coords(&self, point: &[f64; 3]) -> [usize; 3] {
        [0, 1, 2].map(|axis| {
            let t = ((point[axis] - self.origin[axis]) / self.size[axis]).floor();
            // Points beyond the grid are attached to the closest bucket
            (t.max(0.) as usize).min(self.counts[axis] - 1)
        })
    }

    fn bucket_index(&self, [i, j, k]: [usize; 3]) -> usize {
        i + self.counts[0] * (j + self.counts[1] * k)
    }

    fn in_bounds(&self, point: &[f64; 3]) -> bool {
        (0..3).all(|axis| {
            let lower = self.origin[axis];
            let upper = lower + self.size[axis] * self.counts[axis] as f64;
            let tol = geometry::INSIDE_TOLERANCE * (upper - lower).max(1.);
            point[axis] >= lower - tol && point[axis] <= upper + tol
        })
    }

    /// Finds the simplex closest to `point` along with the closest point on it.
    ///
    /// Buckets are visited ring after ring around the bucket of the point, until the ball
    /// of the best distance found so far is covered by the visited buckets.
    ///
    /// Returns [`None`] if there is no simplex.
    pub(crate) fn closest_one(&self, point: &[f64; 3]) -> Option<(usize, Projection)> {
        if self.simplices.is_empty() {
            return None;
        }
        let center = self.bucket_coords(point);
        let max_ring = (0..3)
            .map(|axis| center[axis].max(self.counts[axis] - 1 - center[axis]))
            .max()
            .unwrap_or(0);

        let mut visited = vec![false; self.simplices.len()];
        let mut best: Option<(usize, Projection)> = None;
        for ring in 0..=max_ring {
            let lo = center.map(|c| c.saturating_sub(ring));
            let hi = [0, 1, 2].map(|axis| (center[axis] + ring).min(self.counts[axis] - 1));
            for ((k, j), i) in (lo[2]..=hi[2])
                .cartesian_product(lo[1]..=hi[1])
                .cartesian_product(lo[0]..=hi[0])
            {
                let on_ring = [i, j, k]
                    .iter()
                    .zip(&center)
                    .any(|(&c, &m)| c.abs_diff(m) == ring);
                if !on_ring {
                    continue;
                }
                for &idx in &self.buckets[self.bucket_index([i, j, k])] {
                    if std::mem::replace(&mut visited[idx], true) {
                        continue;
                    }
                    let projection = geometry::closest_point(point, &self.simplices[idx]);
                    if best
                        .as_ref()
                        .map_or(true, |(_, b)| projection.distance_squared < b.distance_squared)
                    {
                        best = Some((idx, projection));
                    }
                }
            }

            if let Some((_, projection)) = &best {
                let margin = (0..3)
                    .flat_map(|axis| {
                        let start = self.origin[axis] + lo[axis] as f64 * self.size[axis];
                        let end = self.origin[axis] + (hi[axis] + 1) as f64 * self.size[axis];
                        let below = (lo[axis] > 0).then(|| point[axis] - start);
                        let above = (hi[axis] < self.counts[axis] - 1).then(|| end - point[axis]);
                        [below, above]
                    })
                    .flatten()
                    .fold(f64::INFINITY, f64::min);
                if projection.distance_squared.sqrt() <= margin {
                    break;
                }
            }
        }
        best
    }
}

impl PointLocator for BucketLocator {
    /// Locates a point among the simplices of its bucket.
    ///
    /// Points on a shared facet are attributed to the simplex with the lowest index.
    fn locate_one(&self, point: &[f64; 3]) -> Option<Location> {
        if self.simplices.is_empty() || !self.in_bounds(point) {
            return None;
        }
        let bucket = self.bucket_index(self.bucket_coords(point));
        self.buckets[bucket].iter().find_map(|&idx| {
            let weights = geometry::barycentric(point, &self.simplices[idx])?;
            geometry::is_inside(&weights).then_some(Location {
                simplex: idx,
                weights,
            })
        })
    }
}
