use thiserror::Error;

use crate::dataset::SampleId;

/// Result type alias for the operations of this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the dataset operations.
///
/// Most of them are precondition violations detected before any work is done.
#[derive(Debug, Error)]
pub enum Error {
    #[error("the dataset does not contain any sample")]
    EmptyDataset,

    #[error("the sample does not contain any mesh")]
    NoMesh,

    #[error("no mesh at time {0}")]
    NoMeshAtTime(f64),

    #[error("the selected mesh does not contain any node")]
    EmptyMesh,

    #[error("no zone matches base {base:?} and zone {zone:?}")]
    NoMatchingZone {
        base: Option<String>,
        zone: Option<String>,
    },

    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("only 2D and 3D meshes are supported, found dimension {0}")]
    UnsupportedDimension(usize),

    #[error("axis {axis} of the grid needs at least 2 points, found {points}")]
    DegenerateAxis { axis: usize, points: usize },

    #[error("`dataset_source` and `dataset_target` should have same sample ids")]
    SampleIdMismatch {
        source_ids: Vec<SampleId>,
        target_ids: Vec<SampleId>,
    },

    #[error("samples {id} of source and target should have same time steps")]
    MeshTimeMismatch { id: SampleId },

    #[error("sample id {0} is already present in the dataset")]
    DuplicateSampleId(SampleId),

    #[error("got {samples} samples but {ids} ids")]
    SampleCountMismatch { samples: usize, ids: usize },

    #[error("field {name:?} has {found} values but its support has {expected} entities")]
    FieldLength {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("field {0:?} not found")]
    FieldNotFound(String),

    #[error("time series {name:?} has {times} times but {values} values")]
    TimeSeriesLength {
        name: String,
        times: usize,
        values: usize,
    },

    #[error("element block of {kind:?} has {len} connectivity entries, not a multiple of {stride}")]
    Connectivity {
        kind: crate::mesh::ElementKind,
        len: usize,
        stride: usize,
    },

    #[error("node index {index} is out of range for a mesh with {count} nodes")]
    NodeIndex { index: usize, count: usize },

    #[error("unknown transfer method {0:?}")]
    UnknownTransferMethod(String),

    #[error("the mesh has no element of its own dimension")]
    NoBulkElement,

    #[error("a finite element space needs at least one component")]
    NoComponent,

    #[error("the operator expects {expected} values, found {found}")]
    OperandLength { expected: usize, found: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
