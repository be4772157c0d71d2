//! Export of sample fields to legacy VTK files, readable by ParaView or VisIt.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::mesh::{ElementKind, Mesh};
use crate::options::Selection;
use crate::sample::Sample;

fn vtk_cell_type(kind: ElementKind) -> u8 {
    match kind {
        ElementKind::Bar2 => 3,
        ElementKind::Tri3 => 5,
        ElementKind::Quad4 => 9,
        ElementKind::Tet4 => 10,
        ElementKind::Hex8 => 12,
    }
}

/// Writes `mesh` as an ASCII legacy VTK unstructured grid with `fields` as point data.
///
/// Every field must have one value per node. Whitespace in names is replaced by `_`.
pub fn write_vtk<W: Write>(mesh: &Mesh, fields: &[(&str, &[f64])], mut writer: W) -> Result<()> {
    for (name, values) in fields {
        if values.len() != mesh.node_count() {
            return Err(Error::FieldLength {
                name: name.to_string(),
                expected: mesh.node_count(),
                found: values.len(),
            });
        }
    }

    writeln!(writer, "# vtk DataFile Version 3.0")?;
    writeln!(writer, "meshops")?;
    writeln!(writer, "ASCII")?;
    writeln!(writer, "DATASET UNSTRUCTURED_GRID")?;

    writeln!(writer, "POINTS {} double", mesh.node_count())?;
    for [x, y, z] in mesh.points() {
        writeln!(writer, "{x} {y} {z}")?;
    }

    let cell_count = mesh.cell_count();
    let size: usize = mesh.cells().map(|(_, cell)| cell.len() + 1).sum();
    writeln!(writer, "CELLS {cell_count} {size}")?;
    for (_, cell) in mesh.cells() {
        write!(writer, "{}", cell.len())?;
        for node in cell {
            write!(writer, " {node}")?;
        }
        writeln!(writer)?;
    }
    writeln!(writer, "CELL_TYPES {cell_count}")?;
    for (kind, _) in mesh.cells() {
        writeln!(writer, "{}", vtk_cell_type(kind))?;
    }

    if !fields.is_empty() {
        writeln!(writer, "POINT_DATA {}", mesh.node_count())?;
    }
    for (name, values) in fields {
        let name = name.split_whitespace().collect::<Vec<_>>().join("_");
        writeln!(writer, "SCALARS {name} double 1")?;
        writeln!(writer, "LOOKUP_TABLE default")?;
        for value in values.iter() {
            writeln!(writer, "{value}")?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn save_vtk(mesh: &Mesh, name: &str, values: &[f64], path: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    write_vtk(mesh, &[(name, values)], writer)?;
    debug!(path = %path.display(), field = name, "VTK file written");
    Ok(())
}

/// Writes the selected mesh of `sample` at `time` to `path`, carrying `field` under the name
/// `field`.
pub fn plot_field<P: AsRef<Path>>(
    sample: &Sample,
    field: &[f64],
    selection: &Selection,
    time: Option<f64>,
    path: P,
) -> Result<()> {
    let mesh = sample
        .extract_mesh(selection.base(), selection.zone(), time)?
        .without_fields();
    save_vtk(&mesh, "field", field, path.as_ref())
}

/// Writes the selected mesh of `sample` at `time` to `path`, carrying its vertex field
/// `field_name`.
pub fn plot_sample_field<P: AsRef<Path>>(
    sample: &Sample,
    field_name: &str,
    selection: &Selection,
    time: Option<f64>,
    path: P,
) -> Result<()> {
    let (base, zone) = (selection.base(), selection.zone());
    let values = sample
        .get_field(field_name, base, zone, time)?
        .ok_or_else(|| Error::FieldNotFound(field_name.to_string()))?;
    let mesh = sample.extract_mesh(base, zone, time)?.without_fields();
    save_vtk(&mesh, field_name, &values, path.as_ref())
}
