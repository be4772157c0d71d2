//! Dataset-level operations: bounding boxes, regular grids and field projections.
//!
//! Projections evaluate the vertex fields of a source mesh at the nodes of a target mesh
//! with a [`TransferOperator`](crate::transfer::TransferOperator) built once per sample and
//! time, then applied to every field.

use approx::relative_eq;
use itertools::{izip, Itertools};
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::fe::FeSpace;
use crate::mesh::Mesh;
use crate::options::{ProjectionOptions, Selection};
use crate::progress::ProgressReporter;
use crate::sample::{Sample, Tree};
use crate::transfer::{transfer_operator, TransferMethod};

/// Coordinate-wise minimum and maximum, each with one value per spatial dimension.
pub type BoundingBox = (Vec<f64>, Vec<f64>);

/// Computes the bounding box of the nodes of every sample at every time.
///
/// Only the bases named `base_name` are considered when given.
pub fn compute_bounding_box(dataset: &Dataset, base_name: Option<&str>) -> Result<BoundingBox> {
    let (_, first) = dataset.iter().next().ok_or(Error::EmptyDataset)?;
    let (mut mins, mut maxs) = first
        .extract_mesh(base_name, None, None)?
        .bounds()
        .ok_or(Error::EmptyMesh)?;

    for (_, sample) in dataset.iter() {
        let times = sample.mesh_times();
        if times.is_empty() {
            return Err(Error::NoMesh);
        }
        for time in times {
            let (lo, hi) = sample
                .extract_mesh(base_name, None, Some(time))?
                .bounds()
                .ok_or(Error::EmptyMesh)?;
            if lo.len() != mins.len() {
                return Err(Error::DimensionMismatch {
                    expected: mins.len(),
                    found: lo.len(),
                });
            }
            for (min, max, lo, hi) in izip!(&mut mins, &mut maxs, lo, hi) {
                *min = min.min(lo);
                *max = max.max(hi);
            }
        }
    }
    Ok((mins, maxs))
}

/// Creates a regular grid with `dimensions[i]` nodes along axis `i` spanning `bbox`.
///
/// The extreme nodes lie exactly on the corners of the bounding box.
pub fn regular_grid(dimensions: &[usize], bbox: &BoundingBox) -> Result<Mesh> {
    let (mins, maxs) = bbox;
    for len in [mins.len(), maxs.len()] {
        if len != dimensions.len() {
            return Err(Error::DimensionMismatch {
                expected: dimensions.len(),
                found: len,
            });
        }
    }
    if dimensions.len() != 2 && dimensions.len() != 3 {
        return Err(Error::UnsupportedDimension(dimensions.len()));
    }
    if let Some((axis, &points)) = dimensions.iter().find_position(|&&n| n < 2) {
        return Err(Error::DegenerateAxis { axis, points });
    }

    let axes = izip!(dimensions, mins, maxs)
        .map(|(&n, &min, &max)| {
            let last = (n - 1) as f64;
            (0..n)
                .map(|i| {
                    let t = i as f64 / last;
                    min * (1. - t) + max * t
                })
                .collect()
        })
        .collect_vec();
    Mesh::rectilinear(&axes)
}

/// Projects the vertex fields of `source` onto the nodes of `target`.
///
/// Returns `target` without its fields, carrying the projected ones instead.
fn project_mesh(source: &Mesh, target: &Mesh, method: TransferMethod) -> Result<Mesh> {
    if source.dim() != target.dim() {
        return Err(Error::DimensionMismatch {
            expected: source.dim(),
            found: target.dim(),
        });
    }
    let space = FeSpace::lagrange_p1(source, 1)?;
    let operator = transfer_operator(&space, target.points(), method)?;

    let mut projected = target.without_fields();
    projected.node_fields = operator.apply_all(&source.node_fields);
    debug!(
        source_nodes = source.node_count(),
        target_nodes = target.node_count(),
        fields = projected.node_fields.len(),
        "Mesh projected"
    );
    Ok(projected)
}

/// Projects every sample of `dataset` onto a regular grid.
///
/// Each mesh time of each sample is replaced by the grid carrying the vertex fields of the
/// selected zones. Scalars and time series are kept, sample ids and their order too.
pub fn project_on_regular_grid(
    dataset: &Dataset,
    dimensions: &[usize],
    bbox: &BoundingBox,
    options: &ProjectionOptions,
) -> Result<Dataset> {
    let grid = regular_grid(dimensions, bbox)?;
    let Selection {
        base_name,
        zone_name,
    } = &options.selection;
    let (base, zone) = (base_name.as_deref(), zone_name.as_deref());
    info!(
        samples = dataset.len(),
        grid_nodes = grid.node_count(),
        method = %options.method,
        "Projecting on regular grid"
    );

    let mut reporter = ProgressReporter::new(
        "project_on_regular_grid",
        dataset.len(),
        options.verbose,
        options.progress.as_ref(),
    );
    let mut projected = Dataset::new();
    for (id, sample) in dataset.iter() {
        let mut out = sample.without_meshes();
        for time in sample.mesh_times() {
            let source = sample.extract_mesh(base, zone, Some(time))?;
            let mesh = project_mesh(&source, &grid, options.method)?;
            debug!(sample = id, time, "Snapshot projected on grid");
            out.add_tree(time, Tree::from_mesh(mesh, base, zone));
        }
        projected.insert(id, out)?;
        reporter.advance(id);
    }

    info!(samples = projected.len(), "Projection on regular grid done");
    Ok(projected)
}

fn check_compatible(source: &Dataset, target: &Dataset) -> Result<()> {
    let (source_ids, target_ids) = (source.sample_ids(), target.sample_ids());
    if source_ids != target_ids {
        return Err(Error::SampleIdMismatch {
            source_ids,
            target_ids,
        });
    }
    for (id, sample) in source.iter() {
        let (source_times, target_times) = (sample.mesh_times(), target[id].mesh_times());
        let same_times = source_times.len() == target_times.len()
            && source_times
                .iter()
                .zip(&target_times)
                .all(|(a, b)| relative_eq!(*a, *b));
        if !same_times {
            return Err(Error::MeshTimeMismatch { id });
        }
    }
    Ok(())
}

/// Projects the fields of `source` onto the geometry of the matching target sample.
fn project_sample(
    source: &Sample,
    target: &mut Sample,
    options: &ProjectionOptions,
) -> Result<()> {
    let (base, zone) = (options.selection.base(), options.selection.zone());
    for time in source.mesh_times() {
        let source_mesh = source.extract_mesh(base, zone, Some(time))?;
        let target_tree = target.get_mesh(Some(time))?;
        let target_mesh = target_tree.extract_mesh(base, zone)?;
        let (base_name, zone_name) = match (base, zone, target_tree.single_zone_names()) {
            (None, None, Some((b, z))) => (Some(b.to_string()), Some(z.to_string())),
            _ => (base.map(str::to_string), zone.map(str::to_string)),
        };

        let mesh = project_mesh(&source_mesh, &target_mesh, options.method)?;
        target.del_tree(time)?;
        target.add_tree(
            time,
            Tree::from_mesh(mesh, base_name.as_deref(), zone_name.as_deref()),
        );
    }
    Ok(())
}

/// Projects the fields of `source` onto the geometry of `target`, in place.
///
/// Both datasets must have the same sample ids in the same order, and paired samples the
/// same mesh times. These conditions are checked before `target` is modified. The projected
/// tree of each time replaces the target one, so fields already on the target are dropped.
pub fn project_on_other_dataset_in_place(
    source: &Dataset,
    target: &mut Dataset,
    options: &ProjectionOptions,
) -> Result<()> {
    check_compatible(source, target)?;
    info!(
        samples = source.len(),
        method = %options.method,
        "Projecting on other dataset"
    );

    let mut reporter = ProgressReporter::new(
        "project_on_other_dataset",
        source.len(),
        options.verbose,
        options.progress.as_ref(),
    );
    for ((id, sample), (_, target_sample)) in source.iter().zip(target.iter_mut()) {
        project_sample(sample, target_sample, options)?;
        reporter.advance(id);
    }
    Ok(())
}

/// Projects the fields of `source` onto the geometry of `target`.
///
/// Same as [`project_on_other_dataset_in_place`] on a copy of `target`.
pub fn project_on_other_dataset(
    source: &Dataset,
    target: &Dataset,
    options: &ProjectionOptions,
) -> Result<Dataset> {
    let mut projected = target.clone();
    project_on_other_dataset_in_place(source, &mut projected, options)?;
    Ok(projected)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::Result;
    use approx::assert_relative_eq;
    use delaunator::{triangulate, Point};
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use rstest::rstest;

    use super::*;
    use crate::sample::tests::house_sample;

    fn house_dataset() -> Result<Dataset> {
        Ok(Dataset::from_samples(vec![house_sample()?, house_sample()?]))
    }

    fn unit_square() -> BoundingBox {
        (vec![0., 0.], vec![1., 1.])
    }

    #[test]
    fn bounding_box_of_houses() -> Result<()> {
        let bbox = compute_bounding_box(&house_dataset()?, None)?;

        assert_eq!(bbox, (vec![0., 0.], vec![1., 1.5]));

        Ok(())
    }

    #[test]
    fn bounding_box_over_times_and_samples() -> Result<()> {
        let mut dataset = house_dataset()?;
        let shifted = Mesh::of_triangles(&[[-1., 0.], [0., 0.], [0., 3.]], &[[0, 1, 2]])?;
        if let Some(sample) = dataset.get_mut(1) {
            sample.add_tree(2., Tree::from_mesh(shifted, None, None));
        }

        let bbox = compute_bounding_box(&dataset, None)?;

        assert_eq!(bbox, (vec![-1., 0.], vec![1., 3.]));

        Ok(())
    }

    #[test]
    fn bounding_box_errors() -> Result<()> {
        assert!(matches!(
            compute_bounding_box(&Dataset::new(), None),
            Err(Error::EmptyDataset)
        ));
        assert!(matches!(
            compute_bounding_box(&Dataset::from_samples(vec![Sample::new()]), None),
            Err(Error::NoMesh)
        ));

        let mut dataset = house_dataset()?;
        let tet = Mesh::of_tetrahedra(
            vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.], [0., 0., 1.]],
            &[[0, 1, 2, 3]],
        )?;
        if let Some(sample) = dataset.get_mut(0) {
            sample.add_tree(1., Tree::from_mesh(tet, None, None));
        }
        assert!(matches!(
            compute_bounding_box(&dataset, None),
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 3
            })
        ));

        Ok(())
    }

    prop_compose! {
        fn arb_points()(
            points in prop::collection::vec((-1e3..1e3_f64, -1e3..1e3_f64), 3..30)
        ) -> Vec<[f64; 2]> {
            points.into_iter().map(|(x, y)| [x, y]).collect()
        }
    }

    proptest! {
        #[test]
        fn bounding_box_contains_every_node(points in arb_points()) {
            let triangulation = triangulate(
                &points.iter().map(|&[x, y]| Point { x, y }).collect_vec(),
            );
            let triangles = triangulation
                .triangles
                .chunks_exact(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect_vec();
            let mesh = Mesh::of_triangles(&points, &triangles).unwrap();
            let mut sample = Sample::new();
            sample.add_tree(0., Tree::from_mesh(mesh, None, None));

            let (mins, maxs) = compute_bounding_box(&Dataset::from_samples(vec![sample]), None).unwrap();

            for [x, y] in &points {
                assert!(mins[0] <= *x && *x <= maxs[0]);
                assert!(mins[1] <= *y && *y <= maxs[1]);
            }
            assert!(points.iter().any(|p| p[0] == mins[0]));
            assert!(points.iter().any(|p| p[1] == maxs[1]));
        }
    }

    #[test]
    fn grid_spans_the_bounding_box() -> Result<()> {
        let bbox = (vec![0.1, -0.3, 2.], vec![0.7, 0.9, 2.2]);
        let grid = regular_grid(&[4, 7, 3], &bbox)?;

        assert_eq!(grid.node_count(), 84);
        assert_eq!(grid.bounds(), Some(bbox));
        assert_eq!(grid.coords(0), [0.1, -0.3, 2.]);
        assert_eq!(grid.coords(83), [0.7, 0.9, 2.2]);

        Ok(())
    }

    #[test]
    fn invalid_grids() {
        assert!(matches!(
            regular_grid(&[3, 3], &(vec![0., 0., 0.], vec![1., 1., 1.])),
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 3
            })
        ));
        assert!(matches!(
            regular_grid(&[3], &(vec![0.], vec![1.])),
            Err(Error::UnsupportedDimension(1))
        ));
        assert!(matches!(
            regular_grid(&[3, 1], &unit_square()),
            Err(Error::DegenerateAxis { axis: 1, points: 1 })
        ));
    }

    #[test]
    fn project_houses_on_grid() -> Result<()> {
        let dataset = house_dataset()?;
        let bbox = compute_bounding_box(&dataset, None)?;

        let projected =
            project_on_regular_grid(&dataset, &[3, 3], &bbox, &ProjectionOptions::default())?;

        assert_eq!(projected.sample_ids(), vec![0, 1]);
        for (_, sample) in projected.iter() {
            assert_eq!(sample.get_nodes(None, None, None)?.len(), 9);
            let field = sample
                .get_field("test", None, None, None)?
                .unwrap_or_default();
            assert_eq!(field.len(), 9);
            assert!(field.iter().all(|v| (-1e-9..=4. + 1e-9).contains(v)));
            assert_eq!(sample.get_scalar("a"), Some(1.));
            assert_eq!(
                sample.get_time_series("b").map(|ts| ts.times.clone()),
                Some(vec![0., 1.])
            );
        }
        assert_eq!(dataset, house_dataset()?);

        Ok(())
    }

    #[test]
    fn grid_projection_keeps_sample_ids() -> Result<()> {
        let mut dataset = Dataset::new();
        dataset.add_samples(vec![house_sample()?, house_sample()?], vec![4, 1])?;

        let projected =
            project_on_regular_grid(&dataset, &[3, 3], &unit_square(), &Default::default())?;

        assert_eq!(projected.sample_ids(), vec![4, 1]);
        assert_eq!(projected[4].get_scalar("a"), Some(1.));

        Ok(())
    }

    #[rstest]
    #[case(TransferMethod::InterpNearest)]
    #[case(TransferMethod::NearestNearest)]
    #[case(TransferMethod::InterpClamp)]
    #[case(TransferMethod::InterpExtrap)]
    #[case(TransferMethod::InterpZeroFill)]
    fn every_method_projects_on_grid(#[case] method: TransferMethod) -> Result<()> {
        let dataset = house_dataset()?;
        let options = ProjectionOptions::default().with_method(method);

        let projected = project_on_regular_grid(&dataset, &[4, 5], &unit_square(), &options)?;

        let field = projected[0].get_field("test", None, None, None)?;
        assert_eq!(field.map(|f| f.len()), Some(20));

        Ok(())
    }

    #[test]
    fn grid_keeps_selection_names() -> Result<()> {
        let dataset = house_dataset()?;
        let options = ProjectionOptions::default().with_base_name("Base");

        let projected = project_on_regular_grid(&dataset, &[3, 3], &unit_square(), &options)?;

        let tree = projected[1].get_mesh(None)?;
        assert_eq!(tree.single_zone_names(), Some(("Base", "Zone")));

        let options = ProjectionOptions::default().with_base_name("Base_3_3");
        assert!(matches!(
            project_on_regular_grid(&dataset, &[3, 3], &unit_square(), &options),
            Err(Error::NoMatchingZone { .. })
        ));

        Ok(())
    }

    #[test]
    fn progress_is_reported_per_sample() -> Result<()> {
        let dataset = house_dataset()?;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let options = ProjectionOptions::default()
            .with_verbose(true)
            .with_progress(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            });

        project_on_regular_grid(&dataset, &[3, 3], &unit_square(), &options)?;

        assert_eq!(calls.load(Ordering::Relaxed), 2);

        Ok(())
    }

    fn linear_field(mesh: &Mesh) -> Vec<f64> {
        mesh.points().iter().map(|p| 2. * p[0] - p[1] + 0.5).collect()
    }

    #[test]
    fn linear_fields_are_reproduced() -> Result<()> {
        let mut mesh = Mesh::regular_grid(&[5, 4], &[0., 0.], &[0.25, 1. / 3.])?;
        mesh.node_fields
            .insert("f".to_string(), linear_field(&mesh));
        let mut sample = Sample::new();
        sample.add_tree(0., Tree::from_mesh(mesh, None, None));
        let dataset = Dataset::from_samples(vec![sample]);

        let projected =
            project_on_regular_grid(&dataset, &[7, 6], &unit_square(), &Default::default())?;

        let grid = projected[0].extract_mesh(None, None, None)?;
        for (value, expected) in grid.node_fields["f"].iter().zip(linear_field(&grid)) {
            assert_relative_eq!(*value, expected, epsilon = 1e-12);
        }

        Ok(())
    }

    /// Unit cube cut into six tetrahedra around its main diagonal.
    fn tetrahedral_cube() -> Result<Dataset> {
        let points = (0..8)
            .map(|i| [(i & 1) as f64, ((i >> 1) & 1) as f64, ((i >> 2) & 1) as f64])
            .collect_vec();
        let tets = [
            [0, 1, 3, 7],
            [0, 1, 5, 7],
            [0, 2, 3, 7],
            [0, 2, 6, 7],
            [0, 4, 5, 7],
            [0, 4, 6, 7],
        ];
        let mut mesh = Mesh::of_tetrahedra(points, &tets)?;
        let field = mesh.points().iter().map(|&p| linear_field_3d(p)).collect();
        mesh.node_fields.insert("f".to_string(), field);
        let mut sample = Sample::new();
        sample.add_tree(0., Tree::from_mesh(mesh, None, None));
        Ok(Dataset::from_samples(vec![sample]))
    }

    fn linear_field_3d([x, y, z]: [f64; 3]) -> f64 {
        x - 2. * y + 3. * z + 1.
    }

    #[rstest]
    #[case(TransferMethod::InterpClamp, (vec![0., 0., 0.], vec![1., 1., 1.]))]
    #[case(TransferMethod::InterpExtrap, (vec![-0.5, 0., 0.], vec![1.5, 2., 1.]))]
    fn linear_fields_are_reproduced_in_3d(
        #[case] method: TransferMethod,
        #[case] bbox: BoundingBox,
    ) -> Result<()> {
        let dataset = tetrahedral_cube()?;
        assert_eq!(
            compute_bounding_box(&dataset, None)?,
            (vec![0., 0., 0.], vec![1., 1., 1.])
        );
        let options = ProjectionOptions::default().with_method(method);

        let projected = project_on_regular_grid(&dataset, &[3, 3, 3], &bbox, &options)?;

        let grid = projected[0].extract_mesh(None, None, None)?;
        assert_eq!(grid.dim(), 3);
        assert_eq!(grid.node_count(), 27);
        for (value, &point) in grid.node_fields["f"].iter().zip(grid.points()) {
            assert_relative_eq!(*value, linear_field_3d(point), epsilon = 1e-12);
        }

        Ok(())
    }

    /// Maximum error after a round trip of a smooth field through a grid of `n` by `n` nodes.
    fn round_trip_error(n: usize) -> Result<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let last = 14;
        let points = (0..=last)
            .cartesian_product(0..=last)
            .map(|(j, i)| {
                let mut jitter = || {
                    if 0 < i && i < last && 0 < j && j < last {
                        rng.gen_range(-0.02..0.02)
                    } else {
                        0.
                    }
                };
                let (dx, dy) = (jitter(), jitter());
                [i as f64 / last as f64 + dx, j as f64 / last as f64 + dy]
            })
            .collect_vec();
        let triangulation = triangulate(&points.iter().map(|&[x, y]| Point { x, y }).collect_vec());
        let triangles = triangulation
            .triangles
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect_vec();
        let mut mesh = Mesh::of_triangles(&points, &triangles)?;
        let exact = points
            .iter()
            .map(|[x, y]| (3. * x).sin() * (2. * y).cos())
            .collect_vec();
        mesh.node_fields.insert("f".to_string(), exact.clone());
        let mut sample = Sample::new();
        sample.add_tree(0., Tree::from_mesh(mesh, None, None));
        let dataset = Dataset::from_samples(vec![sample]);

        let options = ProjectionOptions::default();
        let grid = project_on_regular_grid(&dataset, &[n, n], &unit_square(), &options)?;
        let back = project_on_other_dataset(&grid, &dataset, &options)?;

        let values = back[0]
            .get_field("f", None, None, None)?
            .unwrap_or_default();
        Ok(values
            .iter()
            .zip(&exact)
            .map(|(a, b)| (a - b).abs())
            .fold(0., f64::max))
    }

    #[test]
    fn round_trip_error_decreases_with_resolution() -> Result<()> {
        let coarse = round_trip_error(5)?;
        let fine = round_trip_error(41)?;

        assert!(fine < coarse);
        assert!(fine < 0.05);

        Ok(())
    }

    #[test]
    fn project_houses_on_houses() -> Result<()> {
        let source = house_dataset()?;
        let mut target = house_dataset()?;
        if let Some(sample) = target.get_mut(0) {
            sample.del_all_fields();
        }

        let projected = project_on_other_dataset(&source, &target, &Default::default())?;

        for (_, sample) in projected.iter() {
            let field = sample
                .get_field("test", None, None, None)?
                .unwrap_or_default();
            assert_eq!(field.len(), 5);
            for (value, expected) in field.iter().zip([0., 1., 2., 3., 4.]) {
                assert_relative_eq!(*value, expected, epsilon = 1e-12);
            }
            assert_eq!(sample.get_scalar("a"), Some(1.));
        }
        assert_eq!(target[0].get_field("test", None, None, None)?, None);

        Ok(())
    }

    #[test]
    fn project_in_place_replaces_target_fields() -> Result<()> {
        let source = house_dataset()?;
        let mut target = project_on_regular_grid(
            &source,
            &[3, 3],
            &(vec![0., 0.], vec![1., 1.5]),
            &Default::default(),
        )?;
        if let Some(sample) = target.get_mut(1) {
            sample.add_field("extra", vec![0.; 9], None, None, Default::default(), None)?;
        }

        project_on_other_dataset_in_place(&source, &mut target, &Default::default())?;

        let sample = &target[1];
        assert_eq!(sample.field_names(None, None, None)?, vec!["test"]);
        assert_eq!(sample.get_nodes(None, None, None)?.len(), 9);
        assert_eq!(sample.get_mesh(None)?.single_zone_names(), Some(("Base", "Zone")));

        Ok(())
    }

    #[test]
    fn mismatched_ids_are_rejected() -> Result<()> {
        let source = house_dataset()?;
        let mut target = Dataset::new();
        target.add_samples(vec![house_sample()?, house_sample()?], vec![1, 0])?;
        let before = target.clone();

        assert!(matches!(
            project_on_other_dataset_in_place(&source, &mut target, &Default::default()),
            Err(Error::SampleIdMismatch {
                source_ids,
                target_ids
            }) if source_ids == vec![0, 1] && target_ids == vec![1, 0]
        ));
        assert_eq!(target, before);

        Ok(())
    }

    #[test]
    fn mismatched_times_are_rejected() -> Result<()> {
        let source = house_dataset()?;
        let mut target = house_dataset()?;
        let moved = target.get_mut(1).map(|s| s.del_tree(0.)).transpose()?;
        if let (Some(sample), Some(tree)) = (target.get_mut(1), moved) {
            sample.add_tree(0.5, tree);
        }
        let before = target.clone();

        assert!(matches!(
            project_on_other_dataset(&source, &target, &Default::default()),
            Err(Error::MeshTimeMismatch { id: 1 })
        ));
        assert!(matches!(
            project_on_other_dataset_in_place(&source, &mut target, &Default::default()),
            Err(Error::MeshTimeMismatch { id: 1 })
        ));
        assert_eq!(target, before);

        Ok(())
    }
}
