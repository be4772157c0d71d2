use nalgebra::{DMatrix, DVector, Vector3};
use smallvec::{smallvec, SmallVec};

/// Barycentric weights of a point with respect to the vertices of a simplex.
pub(crate) type Weights = SmallVec<[f64; 4]>;

/// Vertices of a simplex (at most a tetrahedron).
pub(crate) type Simplex = SmallVec<[[f64; 3]; 4]>;

/// Tolerance on barycentric weights for a point to be considered inside a simplex.
pub(crate) const INSIDE_TOLERANCE: f64 = 1e-10;

/// Computes the barycentric weights of the orthogonal projection of `point` on the affine
/// hull of `vertices`.
///
/// For a full-dimensional simplex the projection is the point itself, so the weights are
/// the usual barycentric coordinates (possibly negative if the point lies outside).
///
/// Returns [`None`] if the simplex is degenerate.
pub(crate) fn barycentric(point: &[f64; 3], vertices: &[[f64; 3]]) -> Option<Weights> {
    let (first, rest) = vertices.split_first()?;
    if rest.is_empty() {
        return Some(smallvec![1.]);
    }
    let origin = Vector3::from(*first);
    let edges: SmallVec<[Vector3<f64>; 3]> = rest
        .iter()
        .map(|&vertex| Vector3::from(vertex) - origin)
        .collect();
    let k = edges.len();

    let scale = edges.iter().map(|e| e.norm_squared()).fold(0., f64::max);
    let gram = DMatrix::from_fn(k, k, |i, j| edges[i].dot(&edges[j]));
    if scale == 0. || gram.determinant().abs() <= 1e-12 * scale.powi(k as i32) {
        return None;
    }

    let offset = Vector3::from(*point) - origin;
    let rhs = DVector::from_iterator(k, edges.iter().map(|e| e.dot(&offset)));
    let mu = gram.lu().solve(&rhs)?;

    let mut weights = Weights::with_capacity(k + 1);
    weights.push(1. - mu.sum());
    weights.extend(mu.iter().copied());
    Some(weights)
}

/// Returns `true` if all the weights are non-negative, up to [`INSIDE_TOLERANCE`].
pub(crate) fn is_inside(weights: &[f64]) -> bool {
    weights.iter().all(|&w| w >= -INSIDE_TOLERANCE)
}

/// The point of barycentric coordinates `weights` in the simplex.
pub(crate) fn combine(vertices: &[[f64; 3]], weights: &[f64]) -> [f64; 3] {
    let mut point = [0.; 3];
    for (vertex, &w) in vertices.iter().zip(weights) {
        for (x, &v) in point.iter_mut().zip(vertex) {
            *x += w * v;
        }
    }
    point
}

pub(crate) fn distance_squared(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Closest point of a simplex to a query point.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Projection {
    /// Barycentric weights of the closest point, all in `[0, 1]`.
    pub(crate) weights: Weights,
    pub(crate) distance_squared: f64,
}

/// Finds the closest point of the simplex to `point`.
///
/// If the projection on the affine hull falls outside the simplex, the closest point lies on
/// one of its facets, which are searched recursively.
pub(crate) fn closest_point(point: &[f64; 3], vertices: &[[f64; 3]]) -> Projection {
    if let Some(weights) = barycentric(point, vertices) {
        if weights.iter().all(|&w| w >= 0.) {
            let closest = combine(vertices, &weights);
            return Projection {
                distance_squared: distance_squared(point, &closest),
                weights,
            };
        }
    }
    if vertices.len() == 1 {
        return Projection {
            weights: smallvec![1.],
            distance_squared: distance_squared(point, &vertices[0]),
        };
    }
    (0..vertices.len())
        .map(|skip| {
            let facet: Simplex = vertices
                .iter()
                .enumerate()
                .filter(|&(idx, _)| idx != skip)
                .map(|(_, &vertex)| vertex)
                .collect();
            let mut projection = closest_point(point, &facet);
            projection.weights.insert(skip, 0.);
            projection
        })
        .min_by(|a, b| a.distance_squared.total_cmp(&b.distance_squared))
        .expect("a simplex with several vertices has facets")
}
