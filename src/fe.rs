use std::fmt;

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point3, Rotation3};
use smallvec::SmallVec;
use tracing::trace;

use crate::bucket_locator::BucketLocator;
use crate::error::{Error, Result};
use crate::geometry::Simplex;
use crate::mesh::Mesh;

/// Nearest-node search over the mesh nodes.
///
/// The nodes are stored in a rotated frame: grids and planar meshes put many nodes on the same
/// axis value, which the k-d tree cannot split.
struct NodeTree {
    tree: KdTree<f64, 3>,
    frame: Rotation3<f64>,
}

impl NodeTree {
    fn new(points: &[[f64; 3]]) -> Self {
        let frame = Rotation3::from_euler_angles(0.31, 0.73, 1.17);
        let mut tree: KdTree<f64, 3> = KdTree::new();
        for (i, &point) in points.iter().enumerate() {
            tree.add(&Self::rotate(&frame, &point), i as u64);
        }
        Self { tree, frame }
    }

    fn rotate(frame: &Rotation3<f64>, [x, y, z]: &[f64; 3]) -> [f64; 3] {
        let p = frame * Point3::new(*x, *y, *z);
        [p.x, p.y, p.z]
    }

    fn nearest(&self, point: &[f64; 3]) -> usize {
        let query = Self::rotate(&self.frame, point);
        self.tree.nearest_one::<SquaredEuclidean>(&query).item as usize
    }
}

impl fmt::Debug for NodeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTree").finish_non_exhaustive()
    }
}

/// Linear Lagrange finite element space of a [`Mesh`].
///
/// The degrees of freedom are the mesh nodes, numbered node after node with the components
/// of a node being contiguous. Every bulk element is decomposed into simplices on which the
/// interpolation is linear, quadrangles and hexahedra included.
#[derive(Debug)]
pub struct FeSpace {
    components: usize,
    node_count: usize,
    dim: usize,
    simplices: Vec<SmallVec<[usize; 4]>>,
    cells: Vec<usize>,
    locator: BucketLocator,
    nodes: NodeTree,
}

impl FeSpace {
    /// Builds the space and its numbering for a field with `components` components.
    ///
    /// Fails if `components` is `0` or if the mesh does not have any node.
    pub fn lagrange_p1(mesh: &Mesh, components: usize) -> Result<Self> {
        if components == 0 {
            return Err(Error::NoComponent);
        }
        if mesh.node_count() == 0 {
            return Err(Error::EmptyMesh);
        }

        let mut simplices: Vec<SmallVec<[usize; 4]>> = Vec::new();
        let mut cells = Vec::new();
        for (cell_idx, kind, cell) in mesh.bulk_cells() {
            for local in kind.simplices() {
                simplices.push(local.iter().map(|&l| cell[l]).collect());
                cells.push(cell_idx);
            }
        }
        let coords: Vec<Simplex> = simplices
            .iter()
            .map(|nodes| nodes.iter().map(|&n| mesh.coords(n)).collect())
            .collect();
        trace!(simplices = simplices.len(), "Finite element space built");

        Ok(Self {
            components,
            node_count: mesh.node_count(),
            dim: mesh.dim(),
            simplices,
            cells,
            locator: BucketLocator::new(coords),
            nodes: NodeTree::new(mesh.points()),
        })
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Total number of degrees of freedom.
    pub fn dof_count(&self) -> usize {
        self.node_count * self.components
    }

    /// Index of the degree of freedom of `component` at `node`.
    pub fn dof(&self, node: usize, component: usize) -> usize {
        node * self.components + component
    }

    pub fn simplex_count(&self) -> usize {
        self.simplices.len()
    }

    /// Nodes of a simplex.
    pub fn simplex_nodes(&self, simplex: usize) -> &[usize] {
        &self.simplices[simplex]
    }

    /// Index of the mesh cell a simplex was cut from.
    pub fn simplex_cell(&self, simplex: usize) -> usize {
        self.cells[simplex]
    }

    /// Index of the mesh node closest to `point`.
    pub fn nearest_node(&self, point: &[f64; 3]) -> usize {
        self.nodes.nearest(point)
    }

    pub(crate) fn locator(&self) -> &BucketLocator {
        &self.locator
    }
}
