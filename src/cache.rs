//! Glyph Cache - Read-Through Fragment Memoization
//!
//! Sits in front of the renderer's inline-fragment mode. It holds no
//! correctness responsibility: a disabled or empty cache yields the same
//! fragments, only slower.
//!
//! # Invariants
//! - Keys are `(normalized text, size, lattice id)`.
//! - Two writers racing on one key store equal values; last write wins.
//! - `invalidate_all` returns every key to absent.
//! - At most `capacity` entries are held; inserting a new key into a full
//!   cache evicts an arbitrary entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::debug;

use crate::encoder::encode;
use crate::lattice::{Lattice, LatticeId};
use crate::normalize::normalize;
use crate::render::{render, Orientation};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub text: String,
    pub size: u32,
    pub lattice_id: LatticeId,
}

impl GlyphKey {
    /// Builds a key, normalizing `text`.
    pub fn new(text: &str, size: u32, lattice_id: &str) -> Self {
        Self {
            text: normalize(text),
            size,
            lattice_id: lattice_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub const DEFAULT_GLYPH_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct GlyphCache {
    orientation: Orientation,
    capacity: usize,
    entries: RwLock<HashMap<GlyphKey, Arc<str>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for GlyphCache {
    fn default() -> Self {
        Self {
            orientation: Orientation::default(),
            capacity: DEFAULT_GLYPH_CAPACITY,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl GlyphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of held fragments. Zero is treated as one.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// A cache whose fragments are rendered in a fixed orientation.
    pub fn with_orientation(orientation: Orientation) -> Self {
        Self {
            orientation,
            ..Self::default()
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn get(&self, key: &GlyphKey) -> Option<Arc<str>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    pub fn insert(&self, key: GlyphKey, fragment: Arc<str>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            if let Some(victim) = entries.keys().next().cloned() {
                entries.remove(&victim);
            }
        }
        entries.insert(key, fragment);
    }

    /// Fragment for `text` at `size` on `lattice`, rendering on a miss.
    pub fn get_or_render(&self, text: &str, size: u32, lattice: &Lattice) -> Arc<str> {
        let key = GlyphKey::new(text, size, lattice.id());

        if let Some(hit) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return hit;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let fragment: Arc<str> = render_fragment(&key.text, size, lattice, self.orientation).into();
        self.insert(key, Arc::clone(&fragment));
        fragment
    }

    /// Drop every entry. Call whenever the active lattice changes.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let dropped = entries.len();
        entries.clear();
        debug!("event=cache_invalidate module=cache dropped={}", dropped);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

/// The uncached computation the cache memoizes.
pub fn render_fragment(text: &str, size: u32, lattice: &Lattice, orientation: Orientation) -> String {
    let path = encode(text, lattice);
    render(&path, lattice, lattice.default_style(), orientation).to_fragment(size)
}
