//! Operations on datasets of mesh-based simulations.
//!
//! A [`Dataset`] holds [`Sample`]s, each of which stores one mesh [`Tree`] per time value
//! along with scalars and time series. The crate provides:
//! - the bounding box of a whole dataset ([`compute_bounding_box`])
//! - the projection of every sample onto a common regular grid ([`project_on_regular_grid`])
//! - the projection of the fields of a dataset onto the meshes of another one
//!   ([`project_on_other_dataset`])
//! - the signed distance to the mesh boundary as a new field ([`update_dataset_with_sdf`])
//! - VTK export of fields ([`plot_field`], [`plot_sample_field`])
//!
//! Projections rely on linear finite elements: a [`TransferOperator`] evaluating the fields of
//! the source mesh at the target nodes is built once per sample and time, and applied to every
//! vertex field. How target nodes outside of the source mesh are handled is chosen with a
//! [`TransferMethod`].
//!
//! # Example
//!
//! ```
//! use meshops::{
//!     compute_bounding_box, project_on_regular_grid, Dataset, Mesh, ProjectionOptions, Sample,
//!     Tree,
//! };
//!
//! # fn main() -> meshops::Result<()> {
//! let mut mesh = Mesh::of_triangles(
//!     &[[0., 0.], [1., 0.], [1., 1.], [0., 1.]],
//!     &[[0, 1, 2], [0, 2, 3]],
//! )?;
//! mesh.node_fields.insert("u".to_string(), vec![0., 1., 2., 1.]);
//!
//! let mut sample = Sample::new();
//! sample.add_tree(0., Tree::from_mesh(mesh, None, None));
//! let dataset = Dataset::from_samples(vec![sample]);
//!
//! let bbox = compute_bounding_box(&dataset, None)?;
//! let projected = project_on_regular_grid(&dataset, &[3, 3], &bbox, &ProjectionOptions::default())?;
//!
//! let u = projected[0].get_field("u", None, None, None)?.unwrap_or_default();
//! assert_eq!(u.len(), 9);
//! # Ok(())
//! # }
//! ```
//!
//! Logging goes through [`tracing`]; install a subscriber to see it.

mod bucket_locator;
mod dataset;
mod error;
mod fe;
mod feature_engineering;
mod geometry;
mod mesh;
mod options;
mod point_locator;
mod progress;
mod sample;
mod transfer;
mod transformations;
mod visualization;

pub use bucket_locator::BucketLocator;
pub use dataset::{Dataset, SampleId};
pub use error::{Error, Result};
pub use fe::FeSpace;
pub use feature_engineering::{
    compute_sdf, signed_distance, update_dataset_with_sdf, update_dataset_with_sdf_in_place,
    update_sample_with_sdf, update_sample_with_sdf_in_place, SDF_FIELD,
};
pub use mesh::{ElementBlock, ElementKind, FieldMap, Mesh};
pub use options::{ProjectionOptions, SdfOptions, Selection};
pub use point_locator::{Location, PointLocator};
pub use progress::{Progress, ProgressCallback};
pub use sample::{
    Base, FieldLocation, Sample, TimeSeries, Tree, Zone, DEFAULT_BASE, DEFAULT_ZONE,
};
pub use transfer::{transfer_operator, TransferMethod, TransferOperator, TransferStatus};
pub use transformations::{
    compute_bounding_box, project_on_other_dataset, project_on_other_dataset_in_place,
    project_on_regular_grid, regular_grid, BoundingBox,
};
pub use visualization::{plot_field, plot_sample_field, write_vtk};
