//! Screen-coordinate sets and their on-disk store.
//!
//! Coordinates live in a single JSON file mapping label keys to `[x, y]`
//! pairs. An absent file means "not configured yet" and is not an error;
//! a present file that does not parse is.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{DittoError, Result};
use crate::types::{CoordLabel, Position};

/// File name of the coordinate store inside the per-user config directory.
pub const COORDS_FILE_NAME: &str = "coordinates.json";

/// Partial label-to-position mapping built up by capture.
///
/// A set is allowed to be incomplete on disk and in memory; completeness is
/// only enforced when a run resolves it into [`Targets`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoordinateSet {
    positions: BTreeMap<CoordLabel, Position>,
}

impl CoordinateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or overwrite the position for a label.
    pub fn set(&mut self, label: CoordLabel, position: Position) {
        self.positions.insert(label, position);
    }

    pub fn get(&self, label: CoordLabel) -> Option<Position> {
        self.positions.get(&label).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Labels still missing, in canonical capture order.
    pub fn missing(&self) -> Vec<CoordLabel> {
        CoordLabel::ALL
            .into_iter()
            .filter(|label| !self.positions.contains_key(label))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Resolve into the fixed six targets a run drives, or report every
    /// missing label at once.
    pub fn resolve(&self) -> Result<Targets> {
        let missing = self.missing();
        if !missing.is_empty() {
            let keys: Vec<&str> = missing.iter().map(CoordLabel::key).collect();
            return Err(DittoError::Precondition(format!(
                "coordinate set is missing {}",
                keys.join(", ")
            )));
        }
        // All six are present; the lookups below cannot fail.
        let pick = |label: CoordLabel| self.positions[&label];
        Ok(Targets {
            date_field: pick(CoordLabel::DateField),
            lookup_button: pick(CoordLabel::LookupButton),
            reference_date_field: pick(CoordLabel::ReferenceDateField),
            item_selector: pick(CoordLabel::ItemSelector),
            copy_previous_button: pick(CoordLabel::CopyPreviousButton),
            copy_button: pick(CoordLabel::CopyButton),
        })
    }

    /// Iterate over recorded labels and their positions in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (CoordLabel, Position)> + '_ {
        self.positions.iter().map(|(label, pos)| (*label, *pos))
    }
}

/// Fully resolved set of the six screen targets a run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Targets {
    pub date_field: Position,
    pub lookup_button: Position,
    pub reference_date_field: Position,
    pub item_selector: Position,
    pub copy_previous_button: Position,
    pub copy_button: Position,
}

/// JSON-backed store for a [`CoordinateSet`].
#[derive(Debug, Clone)]
pub struct CoordinateStore {
    path: PathBuf,
}

impl CoordinateStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Store under the per-user config directory.
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(default_config_dir()?.join(COORDS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the set as pretty-printed JSON, creating parent directories
    /// as needed.
    pub fn save(&self, set: &CoordinateSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let json = serde_json::to_string_pretty(set)
            .map_err(|source| self.io_error(io::Error::other(source)))?;
        fs::write(&self.path, json).map_err(|source| self.io_error(source))?;
        info!(path = %self.path.display(), labels = set.len(), "saved coordinate set");
        Ok(())
    }

    /// Read the set back. A missing file yields `Ok(None)`; a file that
    /// exists but does not parse is reported as corrupt.
    pub fn load(&self) -> Result<Option<CoordinateSet>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no coordinate file yet");
                return Ok(None);
            }
            Err(source) => return Err(self.io_error(source)),
        };
        let set = serde_json::from_str(&json).map_err(|source| DittoError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(set))
    }

    fn io_error(&self, source: io::Error) -> DittoError {
        DittoError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

/// Per-user directory ditto keeps its files in.
pub fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|base| base.join("ditto"))
        .ok_or_else(|| DittoError::Persistence {
            path: PathBuf::from("<config dir>"),
            source: io::Error::new(
                io::ErrorKind::NotFound,
                "no per-user configuration directory on this host",
            ),
        })
}
