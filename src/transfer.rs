use std::fmt::Display;
use std::str::FromStr;

use itertools::Itertools;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fe::FeSpace;
use crate::geometry;
use crate::mesh::FieldMap;
use crate::point_locator::PointLocator;

/// How target points are evaluated, inside and outside of the source mesh.
///
/// The names read `<inside>/<outside>`:
/// - `Interp`: linear interpolation in the element containing the point
/// - `Nearest`: value of the nearest node, among the nodes of the containing element inside the
///   mesh and among all the nodes outside of it
/// - `Clamp`: interpolation at the closest point of the mesh
/// - `Extrap`: linear extrapolation of the closest element
/// - `ZeroFill`: `0`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferMethod {
    #[serde(rename = "Interp/Nearest")]
    InterpNearest,
    #[serde(rename = "Nearest/Nearest")]
    NearestNearest,
    #[default]
    #[serde(rename = "Interp/Clamp")]
    InterpClamp,
    #[serde(rename = "Interp/Extrap")]
    InterpExtrap,
    #[serde(rename = "Interp/ZeroFill")]
    InterpZeroFill,
}

impl TransferMethod {
    pub const ALL: [Self; 5] = [
        Self::InterpNearest,
        Self::NearestNearest,
        Self::InterpClamp,
        Self::InterpExtrap,
        Self::InterpZeroFill,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InterpNearest => "Interp/Nearest",
            Self::NearestNearest => "Nearest/Nearest",
            Self::InterpClamp => "Interp/Clamp",
            Self::InterpExtrap => "Interp/Extrap",
            Self::InterpZeroFill => "Interp/ZeroFill",
        }
    }
}

impl Display for TransferMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransferMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| Error::UnknownTransferMethod(s.to_string()))
    }
}

/// How a target point has been evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransferStatus {
    Interpolated,
    Nearest,
    Clamped,
    Extrapolated,
    ZeroFilled,
}

/// Linear map from the degrees of freedom of a [`FeSpace`] to values at target points.
#[derive(Debug, Clone)]
pub struct TransferOperator {
    matrix: CsrMatrix<f64>,
    status: Vec<TransferStatus>,
}

impl TransferOperator {
    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    /// Evaluation status of each target point.
    pub fn status(&self) -> &[TransferStatus] {
        &self.status
    }

    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Number of target points evaluated with each status.
    pub fn status_counts(&self) -> Vec<(TransferStatus, usize)> {
        self.status.iter().copied().counts().into_iter().sorted().collect()
    }

    /// Computes the matrix-vector product with `values`.
    pub fn apply(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.ncols() {
            return Err(Error::OperandLength {
                expected: self.ncols(),
                found: values.len(),
            });
        }
        let result = &self.matrix * &DVector::from_column_slice(values);
        Ok(result.as_slice().to_vec())
    }

    /// Applies the operator to every field of `fields`.
    ///
    /// Fields whose length does not match the operator are skipped.
    pub fn apply_all(&self, fields: &FieldMap) -> FieldMap {
        fields
            .iter()
            .filter_map(|(name, values)| match self.apply(values) {
                Ok(projected) => Some((name.clone(), projected)),
                Err(err) => {
                    debug!(field = %name, %err, "Field skipped");
                    None
                }
            })
            .collect()
    }
}

type Row = SmallVec<[(usize, f64); 4]>;

fn heaviest_node(nodes: &[usize], weights: &[f64]) -> Row {
    let (node, _) = nodes
        .iter()
        .zip(weights)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .expect("simplices have at least one node");
    smallvec![(*node, 1.)]
}

fn weighted(nodes: &[usize], weights: &[f64]) -> Row {
    nodes
        .iter()
        .copied()
        .zip(weights.iter().copied())
        .filter(|&(_, w)| w != 0.)
        .collect()
}

/// Builds the operator evaluating fields of `space` at the `targets` points.
///
/// Fails if some target falls outside of the mesh, the method needs the closest element
/// (`Clamp` or `Extrap`) and the mesh has no element.
pub fn transfer_operator(
    space: &FeSpace,
    targets: &[[f64; 3]],
    method: TransferMethod,
) -> Result<TransferOperator> {
    let locator = space.locator();
    let mut status = Vec::with_capacity(targets.len());
    let mut rows = Vec::with_capacity(targets.len());

    for point in targets {
        let (row_status, row) = match locator.locate_one(point) {
            Some(location) => {
                let nodes = space.simplex_nodes(location.simplex);
                if method == TransferMethod::NearestNearest {
                    (TransferStatus::Nearest, heaviest_node(nodes, &location.weights))
                } else {
                    (TransferStatus::Interpolated, weighted(nodes, &location.weights))
                }
            }
            None if method == TransferMethod::InterpZeroFill => {
                (TransferStatus::ZeroFilled, Row::new())
            }
            None if matches!(
                method,
                TransferMethod::InterpNearest | TransferMethod::NearestNearest
            ) =>
            {
                (
                    TransferStatus::Nearest,
                    smallvec![(space.nearest_node(point), 1.)],
                )
            }
            None => {
                let (simplex, projection) =
                    locator.closest_one(point).ok_or(Error::NoBulkElement)?;
                let nodes = space.simplex_nodes(simplex);
                if method == TransferMethod::InterpExtrap {
                    let weights = geometry::barycentric(point, locator.simplex(simplex))
                        .unwrap_or(projection.weights);
                    (TransferStatus::Extrapolated, weighted(nodes, &weights))
                } else {
                    (
                        TransferStatus::Clamped,
                        weighted(nodes, &projection.weights),
                    )
                }
            }
        };
        status.push(row_status);
        rows.push(row);
    }

    let components = space.components();
    let mut coo = CooMatrix::new(targets.len() * components, space.dof_count());
    for (target, row) in rows.iter().enumerate() {
        for &(node, weight) in row {
            for component in 0..components {
                coo.push(
                    target * components + component,
                    space.dof(node, component),
                    weight,
                );
            }
        }
    }

    let operator = TransferOperator {
        matrix: CsrMatrix::from(&coo),
        status,
    };
    debug!(
        targets = targets.len(),
        nnz = operator.matrix.nnz(),
        %method,
        status = ?operator.status_counts(),
        "Transfer operator built"
    );
    Ok(operator)
}
