//! QBC Core - Lattice Geometric Text Codec
//!
//! # The Laws
//! 1. Encoding Is Total
//! 2. Same Text, Same Lattice, Same Geometry
//! 3. Decode Fails Closed On Structure, Reports Mismatch On Content
//! 4. Lattices Are Read-Only Inputs
//! 5. The Cache Changes Latency, Never Output

pub mod cache;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod hashing;
pub mod lattice;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod render;
pub mod rules;
pub mod source;
pub mod validation;

pub use cache::{CacheStats, GlyphCache, GlyphKey};
pub use config::CodecConfig;
pub use decoder::{decode, decode_json, Decoded};
pub use encoder::{encode, encode_at, CurveControl, EncodedPath, PathSegment};
pub use error::{CodecError, CodecResult};
pub use hashing::{canonical_json, compute_content_hash};
pub use lattice::{Lattice, LatticeId, Point, RawLattice};
pub use normalize::normalize;
pub use pipeline::{Codec, EncodeRequest, RenderRequest};
pub use render::{render, Orientation, RenderStyle, VectorGraphic};
pub use rules::{AnchorIndex, ConnectionPolicy, EncodingRules, Resolution};
pub use source::{DirectorySource, InMemorySource, LatticeCatalog, LatticeSource};

pub const CODEC_VERSION: &str = env!("CARGO_PKG_VERSION");
