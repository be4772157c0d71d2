use std::collections::BTreeMap;

use approx::relative_eq;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mesh::{FieldMap, Mesh};

/// Name of the base created when none is given.
pub const DEFAULT_BASE: &str = "Base";
/// Name of the zone created when none is given.
pub const DEFAULT_ZONE: &str = "Zone";

/// Entities a field is attached to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldLocation {
    #[default]
    Vertex,
    CellCenter,
}

/// A named piece of mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub mesh: Mesh,
}

/// A named group of zones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Base {
    pub name: String,
    pub zones: Vec<Zone>,
}

/// The mesh of a sample at a given time, organized in bases and zones.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub bases: Vec<Base>,
}

fn matches(name: &str, filter: Option<&str>) -> bool {
    filter.map_or(true, |filter| filter == name)
}

impl Tree {
    /// Wraps a mesh into a tree with a single base holding a single zone.
    pub fn from_mesh(mesh: Mesh, base: Option<&str>, zone: Option<&str>) -> Self {
        Self {
            bases: vec![Base {
                name: base.unwrap_or(DEFAULT_BASE).to_string(),
                zones: vec![Zone {
                    name: zone.unwrap_or(DEFAULT_ZONE).to_string(),
                    mesh,
                }],
            }],
        }
    }

    /// Iterates over the zones matching the given base and zone names.
    ///
    /// A `None` filter matches everything.
    pub fn zones<'a>(
        &'a self,
        base: Option<&'a str>,
        zone: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Zone> + 'a {
        self.bases
            .iter()
            .filter(move |b| matches(&b.name, base))
            .flat_map(|b| &b.zones)
            .filter(move |z| matches(&z.name, zone))
    }

    /// The zone fields are added to: the named one, or the first one when a name is missing.
    fn target_zone_mut(&mut self, base: Option<&str>, zone: Option<&str>) -> Result<&mut Zone> {
        self.bases
            .iter_mut()
            .filter(|b| matches(&b.name, base))
            .flat_map(|b| &mut b.zones)
            .find(|z| matches(&z.name, zone))
            .ok_or_else(|| Error::NoMatchingZone {
                base: base.map(str::to_string),
                zone: zone.map(str::to_string),
            })
    }

    /// Names of the base and the zone when the tree holds exactly one of each.
    pub fn single_zone_names(&self) -> Option<(&str, &str)> {
        match self.bases.as_slice() {
            [base] => match base.zones.as_slice() {
                [zone] => Some((&base.name, &zone.name)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Merges the selected zones into a single mesh.
    ///
    /// Connectivities are renumbered so that the nodes of the zones are concatenated in order.
    /// A field is kept only if every selected zone defines it.
    pub fn extract_mesh(&self, base: Option<&str>, zone: Option<&str>) -> Result<Mesh> {
        let selected = self.zones(base, zone).collect_vec();
        let (first, rest) = selected.split_first().ok_or_else(|| Error::NoMatchingZone {
            base: base.map(str::to_string),
            zone: zone.map(str::to_string),
        })?;
        if rest.is_empty() {
            return Ok(first.mesh.clone());
        }

        let dim = first.mesh.dim();
        let mut merged = Mesh::new(dim, Vec::new())?;
        for zone in &selected {
            if zone.mesh.dim() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    found: zone.mesh.dim(),
                });
            }
            let offset = merged.node_count();
            merged.points.extend_from_slice(zone.mesh.points());
            for block in zone.mesh.blocks() {
                let connectivity = block.connectivity.iter().map(|n| n + offset).collect();
                merged.add_block(block.kind(), connectivity)?;
            }
        }
        merged.node_fields = merge_fields(selected.iter().map(|z| &z.mesh.node_fields));
        merged.elem_fields = merge_fields(selected.iter().map(|z| &z.mesh.elem_fields));
        Ok(merged)
    }
}

fn merge_fields<'a>(mut maps: impl Iterator<Item = &'a FieldMap> + Clone) -> FieldMap {
    let Some(first) = maps.next() else {
        return FieldMap::new();
    };
    first
        .keys()
        .filter(|name| maps.clone().all(|map| map.contains_key(*name)))
        .map(|name| {
            let values = std::iter::once(first)
                .chain(maps.clone())
                .flat_map(|map| &map[name])
                .copied()
                .collect();
            (name.clone(), values)
        })
        .collect()
}

/// Values of a quantity along time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

/// A single simulation: mesh trees indexed by time, scalars and time series.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    meshes: Vec<(f64, Tree)>,
    scalars: BTreeMap<String, f64>,
    time_series: BTreeMap<String, TimeSeries>,
}

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, time: f64) -> Option<usize> {
        self.meshes.iter().position(|(t, _)| relative_eq!(*t, time))
    }

    /// Adds a tree at `time`, replacing the one already there.
    pub fn add_tree(&mut self, time: f64, tree: Tree) {
        match self.position(time) {
            Some(idx) => self.meshes[idx].1 = tree,
            None => {
                let idx = self.meshes.partition_point(|(t, _)| *t < time);
                self.meshes.insert(idx, (time, tree));
            }
        }
    }

    /// Removes and returns the tree at `time`.
    pub fn del_tree(&mut self, time: f64) -> Result<Tree> {
        let idx = self.position(time).ok_or(Error::NoMeshAtTime(time))?;
        Ok(self.meshes.remove(idx).1)
    }

    /// Times of the trees, in increasing order.
    pub fn mesh_times(&self) -> Vec<f64> {
        self.meshes.iter().map(|(t, _)| *t).collect()
    }

    /// Resolves an optional time to one of the mesh times, `None` being the first of them.
    pub fn resolve_time(&self, time: Option<f64>) -> Result<f64> {
        match time {
            None => self.meshes.first().map(|(t, _)| *t).ok_or(Error::NoMesh),
            Some(time) if self.meshes.is_empty() => Err(Error::NoMeshAtTime(time)),
            Some(time) => self
                .position(time)
                .map(|idx| self.meshes[idx].0)
                .ok_or(Error::NoMeshAtTime(time)),
        }
    }

    pub fn get_mesh(&self, time: Option<f64>) -> Result<&Tree> {
        let time = self.resolve_time(time)?;
        Ok(&self.meshes[self.position(time).ok_or(Error::NoMeshAtTime(time))?].1)
    }

    pub fn get_mesh_mut(&mut self, time: Option<f64>) -> Result<&mut Tree> {
        let time = self.resolve_time(time)?;
        let idx = self.position(time).ok_or(Error::NoMeshAtTime(time))?;
        Ok(&mut self.meshes[idx].1)
    }

    /// Merges the selected zones of the tree at `time` into a single mesh.
    pub fn extract_mesh(
        &self,
        base: Option<&str>,
        zone: Option<&str>,
        time: Option<f64>,
    ) -> Result<Mesh> {
        self.get_mesh(time)?.extract_mesh(base, zone)
    }

    /// Coordinates of the nodes of the selected zones, restricted to the mesh dimension.
    pub fn get_nodes(
        &self,
        base: Option<&str>,
        zone: Option<&str>,
        time: Option<f64>,
    ) -> Result<Vec<Vec<f64>>> {
        let tree = self.get_mesh(time)?;
        let zones = tree.zones(base, zone).collect_vec();
        if zones.is_empty() {
            return Err(Error::NoMatchingZone {
                base: base.map(str::to_string),
                zone: zone.map(str::to_string),
            });
        }
        Ok(zones.iter().flat_map(|z| z.mesh.nodes()).collect())
    }

    /// Names of the vertex fields defined on any of the selected zones.
    pub fn field_names(
        &self,
        base: Option<&str>,
        zone: Option<&str>,
        time: Option<f64>,
    ) -> Result<Vec<String>> {
        Ok(self
            .get_mesh(time)?
            .zones(base, zone)
            .flat_map(|z| z.mesh.node_fields.keys())
            .sorted()
            .dedup()
            .cloned()
            .collect())
    }

    /// Values of a vertex field over the selected zones.
    ///
    /// Returns [`None`] if one of the zones does not define the field.
    pub fn get_field(
        &self,
        name: &str,
        base: Option<&str>,
        zone: Option<&str>,
        time: Option<f64>,
    ) -> Result<Option<Vec<f64>>> {
        let zones = self.get_mesh(time)?.zones(base, zone).collect_vec();
        if zones.is_empty() {
            return Ok(None);
        }
        Ok(zones
            .iter()
            .map(|z| z.mesh.node_fields.get(name))
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.into_iter().flatten().copied().collect()))
    }

    /// Adds a field to a zone, replacing any field with the same name and location.
    ///
    /// Without names, the field goes to the first zone of the first base. The number of
    /// values must match the number of nodes or cells of the zone.
    pub fn add_field(
        &mut self,
        name: &str,
        values: Vec<f64>,
        base: Option<&str>,
        zone: Option<&str>,
        location: FieldLocation,
        time: Option<f64>,
    ) -> Result<()> {
        let mesh = &mut self.get_mesh_mut(time)?.target_zone_mut(base, zone)?.mesh;
        let (expected, fields) = match location {
            FieldLocation::Vertex => (mesh.node_count(), &mut mesh.node_fields),
            FieldLocation::CellCenter => (mesh.cell_count(), &mut mesh.elem_fields),
        };
        if values.len() != expected {
            return Err(Error::FieldLength {
                name: name.to_string(),
                expected,
                found: values.len(),
            });
        }
        fields.insert(name.to_string(), values);
        Ok(())
    }

    /// Adds a vertex field given over all the selected zones, in the order of
    /// [`Tree::extract_mesh`], splitting it between them.
    pub fn add_field_over_zones(
        &mut self,
        name: &str,
        values: &[f64],
        base: Option<&str>,
        zone: Option<&str>,
        time: Option<f64>,
    ) -> Result<()> {
        let tree = self.get_mesh_mut(time)?;
        let expected: usize = tree.zones(base, zone).map(|z| z.mesh.node_count()).sum();
        if values.len() != expected {
            return Err(Error::FieldLength {
                name: name.to_string(),
                expected,
                found: values.len(),
            });
        }
        let zones = tree
            .bases
            .iter_mut()
            .filter(|b| matches(&b.name, base))
            .flat_map(|b| &mut b.zones)
            .filter(|z| matches(&z.name, zone));
        let mut rest = values;
        for zone in zones {
            let (head, tail) = rest.split_at(zone.mesh.node_count());
            zone.mesh.node_fields.insert(name.to_string(), head.to_vec());
            rest = tail;
        }
        Ok(())
    }

    /// Removes every field of every zone at every time.
    pub fn del_all_fields(&mut self) {
        let zones = self
            .meshes
            .iter_mut()
            .flat_map(|(_, tree)| &mut tree.bases)
            .flat_map(|base| &mut base.zones);
        for zone in zones {
            zone.mesh.node_fields.clear();
            zone.mesh.elem_fields.clear();
        }
    }

    pub fn add_scalar(&mut self, name: &str, value: f64) {
        self.scalars.insert(name.to_string(), value);
    }

    pub fn get_scalar(&self, name: &str) -> Option<f64> {
        self.scalars.get(name).copied()
    }

    pub fn scalar_names(&self) -> Vec<&str> {
        self.scalars.keys().map(String::as_str).collect()
    }

    pub fn scalars(&self) -> impl Iterator<Item = (&str, f64)> {
        self.scalars.iter().map(|(name, &value)| (name.as_str(), value))
    }

    /// Adds a time series, replacing any series with the same name.
    pub fn add_time_series(&mut self, name: &str, times: Vec<f64>, values: Vec<f64>) -> Result<()> {
        if times.len() != values.len() {
            return Err(Error::TimeSeriesLength {
                name: name.to_string(),
                times: times.len(),
                values: values.len(),
            });
        }
        self.time_series
            .insert(name.to_string(), TimeSeries { times, values });
        Ok(())
    }

    pub fn get_time_series(&self, name: &str) -> Option<&TimeSeries> {
        self.time_series.get(name)
    }

    pub fn time_series_names(&self) -> Vec<&str> {
        self.time_series.keys().map(String::as_str).collect()
    }

    pub fn time_series(&self) -> impl Iterator<Item = (&str, &TimeSeries)> {
        self.time_series.iter().map(|(name, ts)| (name.as_str(), ts))
    }

    /// A sample with the same scalars and time series, but no mesh.
    pub(crate) fn without_meshes(&self) -> Self {
        Self {
            meshes: Vec::new(),
            scalars: self.scalars.clone(),
            time_series: self.time_series.clone(),
        }
    }
}
