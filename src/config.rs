//! Codec configuration, loaded from JSON with per-field defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};
use crate::cache::DEFAULT_GLYPH_CAPACITY;
use crate::lattice::LatticeId;
use crate::pipeline::DEFAULT_GLYPH_SIZE;
use crate::render::Orientation;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodecConfig {
    #[serde(default = "default_lattices_dir")]
    pub lattices_dir: PathBuf,
    #[serde(default)]
    pub default_lattice: Option<LatticeId>,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_glyph_size")]
    pub glyph_size: u32,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default)]
    pub orientation: Orientation,
}

fn default_true() -> bool { true }
fn default_lattices_dir() -> PathBuf { PathBuf::from("lattices") }
fn default_glyph_size() -> u32 { DEFAULT_GLYPH_SIZE }
fn default_cache_capacity() -> usize { DEFAULT_GLYPH_CAPACITY }

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            lattices_dir: default_lattices_dir(),
            default_lattice: None,
            cache_enabled: true,
            glyph_size: default_glyph_size(),
            cache_capacity: default_cache_capacity(),
            orientation: Orientation::default(),
        }
    }
}

impl CodecConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> CodecResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| CodecError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
            .map_err(|e| CodecError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}
