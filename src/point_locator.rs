use rayon::prelude::*;
use smallvec::SmallVec;

/// Where a query point lies in a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Index of the simplex containing the point.
    pub simplex: usize,
    /// Barycentric weights of the point in that simplex.
    pub weights: SmallVec<[f64; 4]>,
}

/// A trait to locate one or several query points within a mesh.
pub trait PointLocator {
    /// Locates one query point within a mesh.
    ///
    /// Returns [`None`] if the query point does not lie in any simplex of the mesh.
    fn locate_one(&self, point: &[f64; 3]) -> Option<Location>;

    /// Locates several query points within a mesh.
    fn locate_many(&self, points: &[[f64; 3]]) -> Vec<Option<Location>> {
        points.iter().map(|point| self.locate_one(point)).collect()
    }

    /// Locates several query points within a mesh in parallel.
    fn par_locate_many(&self, points: &[[f64; 3]]) -> Vec<Option<Location>>
    where
        Self: std::marker::Sync,
    {
        points
            .par_iter()
            .map(|point| self.locate_one(point))
            .collect()
    }
}
