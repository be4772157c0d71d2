use std::collections::BTreeMap;

use itertools::{izip, Itertools};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Named arrays of values attached to the nodes or to the cells of a [`Mesh`].
pub type FieldMap = BTreeMap<String, Vec<f64>>;

/// The supported linear element types.
///
/// Local node orderings follow the VTK conventions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Bar2,
    Tri3,
    Quad4,
    Tet4,
    Hex8,
}

impl ElementKind {
    /// Number of nodes of one element.
    pub fn node_count(self) -> usize {
        match self {
            Self::Bar2 => 2,
            Self::Tri3 => 3,
            Self::Quad4 => 4,
            Self::Tet4 => 4,
            Self::Hex8 => 8,
        }
    }

    /// Topological dimension of the element.
    pub fn dimension(self) -> usize {
        match self {
            Self::Bar2 => 1,
            Self::Tri3 | Self::Quad4 => 2,
            Self::Tet4 | Self::Hex8 => 3,
        }
    }

    /// Decomposition of the element into simplices, as lists of local node indices.
    ///
    /// Hexahedra are split into six tetrahedra sharing the `0-6` diagonal, so that two
    /// structured neighbors always split their common face the same way.
    pub(crate) fn simplices(self) -> &'static [&'static [usize]] {
        match self {
            Self::Bar2 => &[&[0, 1]],
            Self::Tri3 => &[&[0, 1, 2]],
            Self::Quad4 => &[&[0, 1, 2], &[0, 2, 3]],
            Self::Tet4 => &[&[0, 1, 2, 3]],
            Self::Hex8 => &[
                &[0, 1, 2, 6],
                &[0, 3, 2, 6],
                &[0, 3, 7, 6],
                &[0, 4, 7, 6],
                &[0, 4, 5, 6],
                &[0, 1, 5, 6],
            ],
        }
    }

    /// Facets of the element, as lists of local node indices.
    pub(crate) fn facets(self) -> &'static [&'static [usize]] {
        match self {
            Self::Bar2 => &[&[0], &[1]],
            Self::Tri3 => &[&[0, 1], &[1, 2], &[2, 0]],
            Self::Quad4 => &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]],
            Self::Tet4 => &[&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]],
            Self::Hex8 => &[
                &[0, 3, 2, 1],
                &[4, 5, 6, 7],
                &[0, 1, 5, 4],
                &[1, 2, 6, 5],
                &[2, 3, 7, 6],
                &[3, 0, 4, 7],
            ],
        }
    }

    /// Element kind of the facets, if any.
    pub(crate) fn facet_kind(self) -> Option<Self> {
        match self {
            Self::Bar2 => None,
            Self::Tri3 | Self::Quad4 => Some(Self::Bar2),
            Self::Tet4 => Some(Self::Tri3),
            Self::Hex8 => Some(Self::Quad4),
        }
    }
}

/// A block of elements of the same kind, stored with an implicit stride.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementBlock {
    pub(crate) kind: ElementKind,
    pub(crate) connectivity: Vec<usize>,
}

impl ElementBlock {
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn cell_count(&self) -> usize {
        self.connectivity.len() / self.kind.node_count()
    }

    pub(crate) fn cells(&self) -> Cells<'_> {
        Cells {
            cells: &self.connectivity,
            stride: self.kind.node_count(),
            idx: 0,
        }
    }
}

pub(crate) struct Cells<'a> {
    cells: &'a [usize],
    stride: usize,
    idx: usize,
}

impl<'a> Iterator for Cells<'a> {
    type Item = &'a [usize];

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.idx * self.stride;
        let end = start + self.stride;
        if end > self.cells.len() {
            return None;
        }
        self.idx += 1;
        // Blocks are validated on insertion so the connectivity length is a multiple of the stride
        Some(&self.cells[start..end])
    }
}

/// An unstructured mesh with linear elements.
///
/// Nodes are always stored with three coordinates, the last one being `0.` for 2D meshes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub(crate) dim: usize,
    pub(crate) points: Vec<[f64; 3]>,
    pub(crate) blocks: Vec<ElementBlock>,
    pub node_fields: FieldMap,
    pub elem_fields: FieldMap,
}

impl Mesh {
    /// Creates a mesh without elements.
    ///
    /// Fails if `dim` is neither 2 nor 3, or if a 2D mesh has a non-zero `z` coordinate.
    pub fn new(dim: usize, points: Vec<[f64; 3]>) -> Result<Self> {
        if dim != 2 && dim != 3 {
            return Err(Error::UnsupportedDimension(dim));
        }
        if dim == 2 && points.iter().any(|p| p[2] != 0.) {
            return Err(Error::DimensionMismatch {
                expected: 2,
                found: 3,
            });
        }
        Ok(Self {
            dim,
            points,
            blocks: Vec::new(),
            node_fields: FieldMap::new(),
            elem_fields: FieldMap::new(),
        })
    }

    /// Creates a 2D mesh from planar points.
    pub fn from_2d_points(points: &[[f64; 2]]) -> Self {
        Self {
            dim: 2,
            points: points.iter().map(|&[x, y]| [x, y, 0.]).collect(),
            blocks: Vec::new(),
            node_fields: FieldMap::new(),
            elem_fields: FieldMap::new(),
        }
    }

    /// Creates a 2D mesh of triangles.
    pub fn of_triangles(points: &[[f64; 2]], triangles: &[[usize; 3]]) -> Result<Self> {
        let mut mesh = Self::from_2d_points(points);
        mesh.add_block(
            ElementKind::Tri3,
            triangles.iter().flatten().copied().collect(),
        )?;
        Ok(mesh)
    }

    /// Creates a 3D mesh of tetrahedra.
    pub fn of_tetrahedra(points: Vec<[f64; 3]>, tetrahedra: &[[usize; 4]]) -> Result<Self> {
        let mut mesh = Self::new(3, points)?;
        mesh.add_block(
            ElementKind::Tet4,
            tetrahedra.iter().flatten().copied().collect(),
        )?;
        Ok(mesh)
    }

    /// Creates a regular grid of `dimensions[i]` points along axis `i`, starting at `origin`
    /// with a constant `spacing` per axis.
    pub fn regular_grid(dimensions: &[usize], origin: &[f64], spacing: &[f64]) -> Result<Self> {
        for len in [origin.len(), spacing.len()] {
            if len != dimensions.len() {
                return Err(Error::DimensionMismatch {
                    expected: dimensions.len(),
                    found: len,
                });
            }
        }
        let axes: Vec<Vec<f64>> = izip!(dimensions, origin, spacing)
            .map(|(&n, &start, &step)| (0..n).map(|i| start + i as f64 * step).collect())
            .collect();
        Self::rectilinear(&axes)
    }

    /// Creates a rectilinear grid from the coordinates of the nodes along each axis.
    ///
    /// Nodes are numbered along x first, then y, then z. Cells are quadrangles in 2D and
    /// hexahedra in 3D. A single coordinate along an axis is accepted but produces no cell.
    pub fn rectilinear(axes: &[Vec<f64>]) -> Result<Self> {
        let dim = axes.len();
        if dim != 2 && dim != 3 {
            return Err(Error::UnsupportedDimension(dim));
        }
        let (nx, ny) = (axes[0].len(), axes[1].len());
        let nz = if dim == 3 { axes[2].len() } else { 1 };

        let points = (0..nz)
            .cartesian_product(0..ny)
            .cartesian_product(0..nx)
            .map(|((k, j), i)| {
                let z = if dim == 3 { axes[2][k] } else { 0. };
                [axes[0][i], axes[1][j], z]
            })
            .collect();
        let mut mesh = Self::new(dim, points)?;

        let node = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);
        let cells_along = |n: usize| n.saturating_sub(1);
        if dim == 2 {
            let connectivity = (0..cells_along(ny))
                .cartesian_product(0..cells_along(nx))
                .flat_map(|(j, i)| {
                    [
                        node(i, j, 0),
                        node(i + 1, j, 0),
                        node(i + 1, j + 1, 0),
                        node(i, j + 1, 0),
                    ]
                })
                .collect();
            mesh.add_block(ElementKind::Quad4, connectivity)?;
        } else {
            let connectivity = (0..cells_along(nz))
                .cartesian_product(0..cells_along(ny))
                .cartesian_product(0..cells_along(nx))
                .flat_map(|((k, j), i)| {
                    [
                        node(i, j, k),
                        node(i + 1, j, k),
                        node(i + 1, j + 1, k),
                        node(i, j + 1, k),
                        node(i, j, k + 1),
                        node(i + 1, j, k + 1),
                        node(i + 1, j + 1, k + 1),
                        node(i, j + 1, k + 1),
                    ]
                })
                .collect();
            mesh.add_block(ElementKind::Hex8, connectivity)?;
        }
        Ok(mesh)
    }

    /// Appends a block of elements.
    ///
    /// Fails if the connectivity length is not a multiple of the number of nodes per element
    /// or if it references a node that does not exist.
    pub fn add_block(&mut self, kind: ElementKind, connectivity: Vec<usize>) -> Result<()> {
        let stride = kind.node_count();
        if connectivity.len() % stride != 0 {
            return Err(Error::Connectivity {
                kind,
                len: connectivity.len(),
                stride,
            });
        }
        let count = self.points.len();
        if let Some(&index) = connectivity.iter().find(|&&idx| idx >= count) {
            return Err(Error::NodeIndex { index, count });
        }
        if connectivity.is_empty() {
            return Ok(());
        }
        self.blocks.push(ElementBlock { kind, connectivity });
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn node_count(&self) -> usize {
        self.points.len()
    }

    pub fn cell_count(&self) -> usize {
        self.blocks.iter().map(ElementBlock::cell_count).sum()
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    pub fn blocks(&self) -> &[ElementBlock] {
        &self.blocks
    }

    pub fn coords(&self, idx: usize) -> [f64; 3] {
        self.points[idx]
    }

    /// The nodes restricted to the spatial dimension of the mesh.
    pub fn nodes(&self) -> Vec<Vec<f64>> {
        self.points.iter().map(|p| p[..self.dim].to_vec()).collect()
    }

    /// Iterates over all the cells of the mesh, block after block.
    pub fn cells(&self) -> impl Iterator<Item = (ElementKind, &[usize])> + '_ {
        self.blocks
            .iter()
            .flat_map(|block| block.cells().map(move |cell| (block.kind, cell)))
    }

    /// Iterates over the cells whose topological dimension is the one of the mesh.
    pub fn bulk_cells(&self) -> impl Iterator<Item = (usize, ElementKind, &[usize])> + '_ {
        let dim = self.dim;
        self.cells()
            .enumerate()
            .filter(move |(_, (kind, _))| kind.dimension() == dim)
            .map(|(idx, (kind, cell))| (idx, kind, cell))
    }

    /// Coordinate-wise minimum and maximum of the nodes, restricted to the mesh dimension.
    ///
    /// Returns [`None`] for a mesh without nodes.
    pub fn bounds(&self) -> Option<(Vec<f64>, Vec<f64>)> {
        let first = self.points.first()?;
        let mut mins = first[..self.dim].to_vec();
        let mut maxs = mins.clone();
        for point in &self.points[1..] {
            for (axis, &x) in point[..self.dim].iter().enumerate() {
                mins[axis] = mins[axis].min(x);
                maxs[axis] = maxs[axis].max(x);
            }
        }
        Some((mins, maxs))
    }

    /// A copy of the geometry, without any field.
    pub fn without_fields(&self) -> Self {
        Self {
            dim: self.dim,
            points: self.points.clone(),
            blocks: self.blocks.clone(),
            node_fields: FieldMap::new(),
            elem_fields: FieldMap::new(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use anyhow::Result;

    use super::*;

    /// Four triangles around a square and a roof on top.
    pub(crate) fn house() -> Result<Mesh> {
        let points = [[0., 0.], [1., 0.], [1., 1.], [0., 1.], [0.5, 1.5]];
        let triangles = [[0, 1, 2], [0, 2, 3], [2, 4, 3]];
        let mut mesh = Mesh::of_triangles(&points, &triangles)?;
        mesh.node_fields
            .insert("test".to_string(), vec![0., 1., 2., 3., 4.]);
        Ok(mesh)
    }

    #[test]
    fn create_mesh_of_triangles() -> Result<()> {
        let mesh = house()?;

        assert_eq!(mesh.dim(), 2);
        assert_eq!(mesh.node_count(), 5);
        assert_eq!(mesh.cell_count(), 3);

        Ok(())
    }

    #[test]
    fn create_mesh_with_mixed_cell_types() -> Result<()> {
        let mut mesh = Mesh::from_2d_points(&[[0., 0.], [1., 0.], [1., 1.], [0., 1.], [0.5, 1.5]]);
        mesh.add_block(ElementKind::Quad4, vec![0, 1, 2, 3])?;
        mesh.add_block(ElementKind::Tri3, vec![3, 2, 4])?;

        assert_eq!(mesh.cell_count(), 2);

        let mut cells = mesh.cells();
        assert_eq!(
            cells.next(),
            Some((ElementKind::Quad4, [0, 1, 2, 3].as_slice()))
        );
        assert_eq!(cells.next(), Some((ElementKind::Tri3, [3, 2, 4].as_slice())));
        assert_eq!(cells.next(), None);

        Ok(())
    }

    #[test]
    fn invalid_connectivity_is_rejected() {
        let mut mesh = Mesh::from_2d_points(&[[0., 0.], [1., 0.], [0., 1.]]);

        assert!(matches!(
            mesh.add_block(ElementKind::Tri3, vec![0, 1]),
            Err(Error::Connectivity { .. })
        ));
        assert!(matches!(
            mesh.add_block(ElementKind::Tri3, vec![0, 1, 3]),
            Err(Error::NodeIndex { index: 3, count: 3 })
        ));
    }

    #[test]
    fn planar_mesh_rejects_out_of_plane_points() {
        assert!(Mesh::new(2, vec![[0., 0., 1.]]).is_err());
        assert!(Mesh::new(4, vec![]).is_err());
    }

    #[test]
    fn regular_grid_2d() -> Result<()> {
        let mesh = Mesh::regular_grid(&[3, 2], &[0., 1.], &[0.5, 2.])?;

        assert_eq!(mesh.node_count(), 6);
        assert_eq!(mesh.cell_count(), 2);
        assert_eq!(mesh.coords(0), [0., 1., 0.]);
        assert_eq!(mesh.coords(2), [1., 1., 0.]);
        assert_eq!(mesh.coords(5), [1., 3., 0.]);

        let mut cells = mesh.cells();
        assert_eq!(
            cells.next(),
            Some((ElementKind::Quad4, [0, 1, 4, 3].as_slice()))
        );
        assert_eq!(
            cells.next(),
            Some((ElementKind::Quad4, [1, 2, 5, 4].as_slice()))
        );
        assert_eq!(cells.next(), None);

        Ok(())
    }

    #[test]
    fn regular_grid_3d() -> Result<()> {
        let mesh = Mesh::regular_grid(&[2, 3, 4], &[0., 0., 0.], &[1., 1., 1.])?;

        assert_eq!(mesh.dim(), 3);
        assert_eq!(mesh.node_count(), 24);
        assert_eq!(mesh.cell_count(), 6);
        assert_eq!(mesh.coords(23), [1., 2., 3.]);
        assert_eq!(mesh.bounds(), Some((vec![0., 0., 0.], vec![1., 2., 3.])));

        Ok(())
    }

    #[test]
    fn rectilinear_grid() -> Result<()> {
        let mesh = Mesh::rectilinear(&[vec![0., 1., 3.], vec![-1., 1.]])?;

        assert_eq!(mesh.node_count(), 6);
        assert_eq!(mesh.cell_count(), 2);
        assert_eq!(mesh.coords(2), [3., -1., 0.]);
        assert_eq!(mesh.coords(4), [1., 1., 0.]);

        Ok(())
    }

    #[test]
    fn grid_with_invalid_dimensions() {
        assert!(matches!(
            Mesh::regular_grid(&[2], &[0.], &[1.]),
            Err(Error::UnsupportedDimension(1))
        ));
        assert!(matches!(
            Mesh::regular_grid(&[2, 2], &[0.], &[1., 1.]),
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn bounds_of_empty_mesh() {
        let mesh = Mesh::from_2d_points(&[]);

        assert_eq!(mesh.bounds(), None);
    }

    #[test]
    fn bulk_cells_skip_boundary_elements() -> Result<()> {
        let mut mesh = house()?;
        mesh.add_block(ElementKind::Bar2, vec![0, 1])?;

        assert_eq!(mesh.cell_count(), 4);
        assert_eq!(mesh.bulk_cells().count(), 3);

        Ok(())
    }
}
