//! Geometric features computed on the meshes of samples.

use indexmap::IndexMap;
use itertools::Itertools;
use rayon::prelude::*;
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::bucket_locator::BucketLocator;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::fe::FeSpace;
use crate::geometry::Simplex;
use crate::mesh::{ElementKind, Mesh};
use crate::options::{SdfOptions, Selection};
use crate::point_locator::PointLocator;
use crate::progress::ProgressReporter;
use crate::sample::Sample;

/// Name of the field holding the signed distance.
pub const SDF_FIELD: &str = "sdf";

type Facet = SmallVec<[usize; 4]>;

/// Facets of the bulk elements that belong to a single element.
fn boundary_facets(mesh: &Mesh) -> Vec<(ElementKind, Facet)> {
    let mut facets: IndexMap<Facet, (usize, ElementKind, Facet)> = IndexMap::new();
    for (_, kind, cell) in mesh.bulk_cells() {
        let Some(facet_kind) = kind.facet_kind() else {
            continue;
        };
        for local in kind.facets() {
            let nodes: Facet = local.iter().map(|&l| cell[l]).collect();
            let key = nodes.iter().copied().sorted().collect();
            facets
                .entry(key)
                .and_modify(|(count, _, _)| *count += 1)
                .or_insert((1, facet_kind, nodes));
        }
    }
    facets
        .into_values()
        .filter(|(count, _, _)| *count == 1)
        .map(|(_, kind, nodes)| (kind, nodes))
        .collect()
}

/// Signed distance from `points` to the boundary of `mesh`.
///
/// The boundary is made of the facets of the bulk elements that are not shared with another
/// element. Distances are negative inside the mesh and positive outside.
pub fn signed_distance(mesh: &Mesh, points: &[[f64; 3]]) -> Result<Vec<f64>> {
    let space = FeSpace::lagrange_p1(mesh, 1)?;
    if space.simplex_count() == 0 {
        return Err(Error::NoBulkElement);
    }
    let boundary: Vec<Simplex> = boundary_facets(mesh)
        .iter()
        .flat_map(|(kind, facet)| {
            kind.simplices().iter().map(move |local| {
                local
                    .iter()
                    .map(|&l| mesh.coords(facet[l]))
                    .collect::<Simplex>()
            })
        })
        .collect();
    debug!(
        boundary_simplices = boundary.len(),
        points = points.len(),
        "Boundary extracted"
    );
    let boundary = BucketLocator::new(boundary);

    Ok(points
        .par_iter()
        .map(|point| {
            let distance = boundary
                .closest_one(point)
                .map_or(f64::INFINITY, |(_, projection)| {
                    projection.distance_squared.sqrt()
                });
            if space.locator().locate_one(point).is_some() {
                -distance
            } else {
                distance
            }
        })
        .collect())
}

/// Signed distance to the boundary at every node of the selected mesh at `time`.
pub fn compute_sdf(sample: &Sample, selection: &Selection, time: Option<f64>) -> Result<Vec<f64>> {
    let mesh = sample.extract_mesh(selection.base(), selection.zone(), time)?;
    signed_distance(&mesh, mesh.points())
}

/// Adds the [`SDF_FIELD`] vertex field to the selected zones of `sample` at `time`.
pub fn update_sample_with_sdf_in_place(
    sample: &mut Sample,
    selection: &Selection,
    time: Option<f64>,
) -> Result<()> {
    let sdf = compute_sdf(sample, selection, time)?;
    sample.add_field_over_zones(SDF_FIELD, &sdf, selection.base(), selection.zone(), time)
}

/// Same as [`update_sample_with_sdf_in_place`] on a copy of `sample`.
pub fn update_sample_with_sdf(
    sample: &Sample,
    selection: &Selection,
    time: Option<f64>,
) -> Result<Sample> {
    let mut updated = sample.clone();
    update_sample_with_sdf_in_place(&mut updated, selection, time)?;
    Ok(updated)
}

/// Adds the [`SDF_FIELD`] vertex field to every sample of `dataset` at every time.
pub fn update_dataset_with_sdf_in_place(dataset: &mut Dataset, options: &SdfOptions) -> Result<()> {
    info!(samples = dataset.len(), "Computing signed distances");
    let mut reporter = ProgressReporter::new(
        "update_dataset_with_sdf",
        dataset.len(),
        options.verbose,
        options.progress.as_ref(),
    );
    for (id, sample) in dataset.iter_mut() {
        for time in sample.mesh_times() {
            update_sample_with_sdf_in_place(sample, &options.selection, Some(time))?;
        }
        reporter.advance(id);
    }
    Ok(())
}

/// Same as [`update_dataset_with_sdf_in_place`] on a copy of `dataset`.
pub fn update_dataset_with_sdf(dataset: &Dataset, options: &SdfOptions) -> Result<Dataset> {
    let mut updated = dataset.clone();
    update_dataset_with_sdf_in_place(&mut updated, options)?;
    Ok(updated)
}
