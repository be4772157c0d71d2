use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::progress::{Progress, ProgressCallback};
use crate::transfer::TransferMethod;

/// Base and zone filter applied when extracting meshes from samples.
///
/// A missing name selects every base, or every zone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub base_name: Option<String>,
    pub zone_name: Option<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_name(mut self, name: impl Into<String>) -> Self {
        self.base_name = Some(name.into());
        self
    }

    pub fn with_zone_name(mut self, name: impl Into<String>) -> Self {
        self.zone_name = Some(name.into());
        self
    }

    pub fn base(&self) -> Option<&str> {
        self.base_name.as_deref()
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone_name.as_deref()
    }
}

/// Options of the projections onto a regular grid or onto another dataset.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    #[serde(flatten)]
    pub selection: Selection,
    pub method: TransferMethod,
    /// Logs a line per processed sample.
    pub verbose: bool,
    #[serde(skip)]
    pub progress: Option<ProgressCallback>,
}

impl ProjectionOptions {
    pub fn with_base_name(mut self, name: impl Into<String>) -> Self {
        self.selection = self.selection.with_base_name(name);
        self
    }

    pub fn with_zone_name(mut self, name: impl Into<String>) -> Self {
        self.selection = self.selection.with_zone_name(name);
        self
    }

    pub fn with_method(mut self, method: TransferMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_progress(mut self, callback: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for ProjectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionOptions")
            .field("selection", &self.selection)
            .field("method", &self.method)
            .field("verbose", &self.verbose)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Options of the signed distance feature.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SdfOptions {
    #[serde(flatten)]
    pub selection: Selection,
    pub verbose: bool,
    #[serde(skip)]
    pub progress: Option<ProgressCallback>,
}

impl SdfOptions {
    pub fn with_base_name(mut self, name: impl Into<String>) -> Self {
        self.selection = self.selection.with_base_name(name);
        self
    }

    pub fn with_zone_name(mut self, name: impl Into<String>) -> Self {
        self.selection = self.selection.with_zone_name(name);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_progress(mut self, callback: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for SdfOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdfOptions")
            .field("selection", &self.selection)
            .field("verbose", &self.verbose)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
