//! Codec Pipeline - Single Entry Point
//!
//! Wires the lattice catalog, encoder, decoder, renderer and glyph cache
//! together for callers that address lattices by id. Every operation takes
//! the lattice as an explicit, shared, read-only value; nothing reads
//! ambient state.

use std::sync::{Arc, RwLock};
use std::thread;

use log::info;
use serde::{Deserialize, Serialize};

use crate::cache::{render_fragment, CacheStats, GlyphCache};
use crate::config::CodecConfig;
use crate::decoder::{self, Decoded};
use crate::encoder::{self, EncodedPath};
use crate::error::CodecResult;
use crate::lattice::{Lattice, LatticeId};
use crate::render::{self, Orientation, RenderStyle, VectorGraphic};
use crate::source::{DirectorySource, LatticeCatalog, LatticeSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeRequest {
    pub text: String,
    #[serde(default)]
    pub lattice_id: Option<LatticeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub text: String,
    #[serde(default)]
    pub lattice_id: Option<LatticeId>,
    /// Falls back to the lattice's default style.
    #[serde(default)]
    pub style: Option<RenderStyle>,
    #[serde(default)]
    pub orientation: Orientation,
    /// Document when true, inline fragment otherwise.
    #[serde(default)]
    pub standalone: bool,
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_size() -> u32 { DEFAULT_GLYPH_SIZE }

pub const DEFAULT_GLYPH_SIZE: u32 = 32;

/// The codec pipeline - single entry point for id-addressed operations
pub struct Codec {
    catalog: LatticeCatalog,
    cache: Option<GlyphCache>,
    orientation: Orientation,
    glyph_size: u32,
    active_lattice: RwLock<Option<LatticeId>>,
}

impl Codec {
    pub fn new(catalog: LatticeCatalog) -> Self {
        Self {
            catalog,
            cache: Some(GlyphCache::new()),
            orientation: Orientation::Normal,
            glyph_size: DEFAULT_GLYPH_SIZE,
            active_lattice: RwLock::new(None),
        }
    }

    pub fn from_source(source: impl LatticeSource + 'static) -> Self {
        Self::new(LatticeCatalog::new(Box::new(source)))
    }

    /// Directory-backed codec configured from `config`.
    pub fn from_config(config: &CodecConfig) -> Self {
        let mut catalog = LatticeCatalog::new(Box::new(DirectorySource::new(&config.lattices_dir)));
        if let Some(id) = &config.default_lattice {
            catalog = catalog.with_default(id.clone());
        }
        let codec = Self::new(catalog)
            .with_orientation(config.orientation)
            .with_cache_capacity(config.cache_capacity)
            .with_glyph_size(config.glyph_size);
        if config.cache_enabled {
            codec
        } else {
            codec.without_cache()
        }
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Orientation used for glyph fragments. Resets the glyph cache.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        if let Some(cache) = &self.cache {
            let capacity = cache.capacity();
            self.cache = Some(GlyphCache::with_orientation(orientation).with_capacity(capacity));
        }
        self
    }

    /// Bound the glyph cache. Resets the glyph cache.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        if self.cache.is_some() {
            self.cache = Some(GlyphCache::with_orientation(self.orientation).with_capacity(capacity));
        }
        self
    }

    /// Fragment height used when a glyph request names no size.
    pub fn with_glyph_size(mut self, size: u32) -> Self {
        self.glyph_size = size.max(1);
        self
    }

    pub fn glyph_size(&self) -> u32 {
        self.glyph_size
    }

    pub fn catalog(&self) -> &LatticeCatalog {
        &self.catalog
    }

    /// Resolve a lattice by id, or the default lattice.
    pub fn lattice(&self, id: Option<&str>) -> CodecResult<Arc<Lattice>> {
        self.catalog.get(id)
    }

    pub fn encode(&self, request: &EncodeRequest) -> CodecResult<EncodedPath> {
        let lattice = self.lattice(request.lattice_id.as_deref())?;
        Ok(encoder::encode(&request.text, &lattice))
    }

    /// Encode many texts against one lattice in parallel.
    ///
    /// Output order matches input order.
    pub fn encode_batch<T>(&self, texts: &[T], lattice_id: Option<&str>) -> CodecResult<Vec<EncodedPath>>
    where
        T: AsRef<str> + Sync,
    {
        let lattice = self.lattice(lattice_id)?;
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(texts.len());
        let chunk = texts.len().div_ceil(workers);
        let lattice: &Lattice = &lattice;

        let encoded = thread::scope(|s| {
            let handles: Vec<_> = texts
                .chunks(chunk)
                .map(|part| {
                    s.spawn(move || {
                        part.iter()
                            .map(|t| encoder::encode(t.as_ref(), lattice))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect::<Vec<_>>()
        });

        info!(
            "event=encode_batch module=pipeline lattice={} count={} workers={}",
            lattice.id(),
            encoded.len(),
            workers
        );
        Ok(encoded)
    }

    /// Decode against the lattice named by the payload itself.
    pub fn decode(&self, path: &EncodedPath) -> CodecResult<Decoded> {
        let lattice = self.lattice(Some(path.lattice_type.as_str()))?;
        decoder::decode(path, &lattice)
    }

    /// Decode against an explicitly chosen lattice.
    pub fn decode_with(&self, path: &EncodedPath, lattice_id: &str) -> CodecResult<Decoded> {
        let lattice = self.lattice(Some(lattice_id))?;
        decoder::decode(path, &lattice)
    }

    pub fn decode_json(&self, payload: &str) -> CodecResult<Decoded> {
        let path = decoder::parse_payload(payload)?;
        self.decode(&path)
    }

    /// Encode and render to drawable primitives.
    pub fn render_graphic(&self, request: &RenderRequest) -> CodecResult<VectorGraphic> {
        let lattice = self.lattice(request.lattice_id.as_deref())?;
        let path = encoder::encode(&request.text, &lattice);
        let style = request.style.as_ref().unwrap_or(lattice.default_style());
        Ok(render::render(&path, &lattice, style, request.orientation))
    }

    /// Encode and render to SVG text.
    pub fn render_svg(&self, request: &RenderRequest) -> CodecResult<String> {
        let graphic = self.render_graphic(request)?;

        Ok(if request.standalone {
            let (width, height) = graphic.dimensions(request.size);
            graphic.to_document(width, height)
        } else {
            graphic.to_fragment(request.size)
        })
    }

    /// Inline glyph fragment, served through the cache when enabled.
    pub fn glyph(
        &self,
        text: &str,
        size: Option<u32>,
        lattice_id: Option<&str>,
    ) -> CodecResult<Arc<str>> {
        let lattice = self.lattice(lattice_id)?;
        let size = size.unwrap_or(self.glyph_size);
        Ok(match &self.cache {
            Some(cache) => cache.get_or_render(text, size, &lattice),
            None => render_fragment(text, size, &lattice, self.orientation).into(),
        })
    }

    /// Record the lattice the presentation layer is showing.
    ///
    /// Switching to a different id drops every cached glyph.
    pub fn set_active_lattice(&self, id: &str) {
        let mut active = self.active_lattice.write().unwrap_or_else(|e| e.into_inner());
        if active.as_deref() != Some(id) {
            if let Some(previous) = active.as_deref() {
                info!(
                    "event=active_lattice_changed module=pipeline from={} to={}",
                    previous, id
                );
            }
            self.invalidate_glyphs();
            *active = Some(id.to_string());
        }
    }

    pub fn active_lattice(&self) -> Option<LatticeId> {
        self.active_lattice
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn invalidate_glyphs(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(GlyphCache::stats)
    }
}
