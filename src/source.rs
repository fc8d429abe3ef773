//! Lattice Source - External Registry Seam
//!
//! The codec never owns lattice storage. A [`LatticeSource`] supplies raw
//! anchors and rules per id; a [`LatticeCatalog`] fetches each id at most
//! once and hands out shared, immutable [`Lattice`] values.
//!
//! There is no built-in fallback lattice: when the source cannot answer,
//! the call fails with `LatticeUnavailable`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use log::{info, warn};

use crate::error::{CodecError, CodecResult};
use crate::lattice::{Lattice, LatticeId, RawLattice};

/// Read-only access to lattice definitions.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait LatticeSource: Send + Sync {
    /// Raw definition for `id`.
    fn fetch(&self, id: &str) -> CodecResult<RawLattice>;

    /// Id of the lattice used when a caller names none.
    fn default_id(&self) -> CodecResult<LatticeId>;

    /// Every id this source can supply, sorted.
    fn ids(&self) -> Vec<LatticeId>;
}

/// Source backed by definitions registered in memory.
#[derive(Debug, Default)]
pub struct InMemorySource {
    lattices: BTreeMap<LatticeId, RawLattice>,
    default_id: Option<LatticeId>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, raw: RawLattice) {
        if raw.default {
            self.default_id = Some(raw.id.clone());
        }
        self.lattices.insert(raw.id.clone(), raw);
    }

    pub fn with(mut self, raw: RawLattice) -> Self {
        self.register(raw);
        self
    }

    pub fn set_default(&mut self, id: impl Into<LatticeId>) {
        self.default_id = Some(id.into());
    }
}

impl LatticeSource for InMemorySource {
    fn fetch(&self, id: &str) -> CodecResult<RawLattice> {
        self.lattices
            .get(id)
            .cloned()
            .ok_or_else(|| CodecError::unavailable(id, "not registered"))
    }

    fn default_id(&self) -> CodecResult<LatticeId> {
        self.default_id
            .clone()
            .or_else(|| self.lattices.keys().next().cloned())
            .ok_or_else(|| CodecError::unavailable("<default>", "no lattices registered"))
    }

    fn ids(&self) -> Vec<LatticeId> {
        self.lattices.keys().cloned().collect()
    }
}

/// Source reading `<dir>/*.json` files, one lattice per file.
///
/// Files are read on every fetch; put a [`LatticeCatalog`] in front.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_all(&self) -> Vec<RawLattice> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return vec![];
        };
        let mut lattices = vec![];
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(false, |e| e == "json") {
                match read_raw(&path) {
                    Ok(raw) => lattices.push(raw),
                    Err(e) => warn!(
                        "event=lattice_skipped module=source path={} error=\"{}\"",
                        path.display(),
                        e
                    ),
                }
            }
        }
        lattices.sort_by(|a, b| a.id.cmp(&b.id));
        lattices
    }
}

fn read_raw(path: &Path) -> Result<RawLattice, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

/// Ids name files inside the lattice directory and nothing else.
fn is_plain_id(id: &str) -> bool {
    !id.is_empty()
        && !id.contains("..")
        && !id.contains(['/', '\\', '\0'])
        && !Path::new(id).is_absolute()
}

impl LatticeSource for DirectorySource {
    fn fetch(&self, id: &str) -> CodecResult<RawLattice> {
        if !is_plain_id(id) {
            return Err(CodecError::unavailable(id, "invalid lattice id"));
        }
        let named = self.dir.join(format!("{}.json", id));
        if named.is_file() {
            let raw = read_raw(&named).map_err(|e| CodecError::unavailable(id, e))?;
            if raw.id == id {
                return Ok(raw);
            }
        }
        self.read_all()
            .into_iter()
            .find(|raw| raw.id == id)
            .ok_or_else(|| {
                CodecError::unavailable(id, format!("not found in {}", self.dir.display()))
            })
    }

    fn default_id(&self) -> CodecResult<LatticeId> {
        let all = self.read_all();
        all.iter()
            .find(|raw| raw.default)
            .or_else(|| all.first())
            .map(|raw| raw.id.clone())
            .ok_or_else(|| {
                CodecError::unavailable(
                    "<default>",
                    format!("no lattices in {}", self.dir.display()),
                )
            })
    }

    fn ids(&self) -> Vec<LatticeId> {
        self.read_all().into_iter().map(|raw| raw.id).collect()
    }
}

/// Fetch-once cache of built lattices.
///
/// Failures are not remembered; the next call asks the source again.
pub struct LatticeCatalog {
    source: Box<dyn LatticeSource>,
    default_override: Option<LatticeId>,
    loaded: RwLock<HashMap<LatticeId, Arc<Lattice>>>,
}

impl LatticeCatalog {
    pub fn new(source: Box<dyn LatticeSource>) -> Self {
        Self {
            source,
            default_override: None,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    /// Use `id` instead of the source's default.
    pub fn with_default(mut self, id: impl Into<LatticeId>) -> Self {
        self.default_override = Some(id.into());
        self
    }

    /// Resolve `id`, or the default lattice when `None`.
    pub fn get(&self, id: Option<&str>) -> CodecResult<Arc<Lattice>> {
        let id = match id {
            Some(id) => id.to_string(),
            None => self.default_id()?,
        };

        if let Some(lattice) = self.loaded_lattice(&id) {
            return Ok(lattice);
        }

        let raw = self.source.fetch(&id)?;
        if raw.id != id {
            return Err(CodecError::unavailable(
                id,
                format!("source returned lattice {}", raw.id),
            ));
        }
        let lattice = Arc::new(Lattice::from_raw(raw)?);

        let mut loaded = self.loaded.write().unwrap_or_else(|e| e.into_inner());
        let shared = loaded.entry(id.clone()).or_insert(lattice);
        info!(
            "event=lattice_loaded module=source lattice={} anchors={} rules_version={}",
            id,
            shared.anchor_count(),
            shared.rules().version
        );
        Ok(Arc::clone(shared))
    }

    pub fn default_id(&self) -> CodecResult<LatticeId> {
        match &self.default_override {
            Some(id) => Ok(id.clone()),
            None => self.source.default_id(),
        }
    }

    pub fn ids(&self) -> Vec<LatticeId> {
        self.source.ids()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded_lattice(id).is_some()
    }

    fn loaded_lattice(&self, id: &str) -> Option<Arc<Lattice>> {
        let loaded = self.loaded.read().unwrap_or_else(|e| e.into_inner());
        loaded.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Point;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn raw(id: &str, default: bool) -> RawLattice {
        RawLattice {
            id: id.to_string(),
            anchors_json: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
            rules_json: json!({"mapping": {"A": 0}}),
            default_style: None,
            default,
        }
    }

    struct CountingSource {
        inner: InMemorySource,
        fetches: Arc<AtomicUsize>,
    }

    impl LatticeSource for CountingSource {
        fn fetch(&self, id: &str) -> CodecResult<RawLattice> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(id)
        }
        fn default_id(&self) -> CodecResult<LatticeId> {
            self.inner.default_id()
        }
        fn ids(&self) -> Vec<LatticeId> {
            self.inner.ids()
        }
    }

    #[test]
    fn test_in_memory_default() {
        let source = InMemorySource::new().with(raw("b", false)).with(raw("a", false));
        assert_eq!(source.default_id().unwrap(), "a");
        let source = source.with(raw("c", true));
        assert_eq!(source.default_id().unwrap(), "c");
        assert_eq!(source.ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_source_unavailable() {
        let catalog = LatticeCatalog::new(Box::new(InMemorySource::new()));
        assert!(catalog.get(None).unwrap_err().is_lattice_unavailable());
        assert!(catalog.get(Some("x")).unwrap_err().is_lattice_unavailable());
    }

    #[test]
    fn test_catalog_fetches_once() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            inner: InMemorySource::new().with(raw("a", true)),
            fetches: Arc::clone(&fetches),
        };
        let catalog = LatticeCatalog::new(Box::new(source));
        let first = catalog.get(Some("a")).unwrap();
        let second = catalog.get(None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(catalog.is_loaded("a"));
    }

    #[test]
    fn test_invalid_lattice_unavailable() {
        let mut bad = raw("bad", false);
        bad.anchors_json.clear();
        let catalog = LatticeCatalog::new(Box::new(InMemorySource::new().with(bad)));
        let err = catalog.get(Some("bad")).unwrap_err();
        assert!(err.is_lattice_unavailable());
        assert!(!catalog.is_loaded("bad"));
    }

    #[test]
    fn test_default_override() {
        let source = InMemorySource::new().with(raw("a", true)).with(raw("b", false));
        let catalog = LatticeCatalog::new(Box::new(source)).with_default("b");
        assert_eq!(catalog.get(None).unwrap().id(), "b");
    }

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        for (id, default) in [("alpha", false), ("beta", true)] {
            let json = serde_json::to_string(&raw(id, default)).unwrap();
            fs::write(dir.path().join(format!("{}.json", id)), json).unwrap();
        }
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = DirectorySource::new(dir.path());
        assert_eq!(source.ids(), vec!["alpha", "beta"]);
        assert_eq!(source.default_id().unwrap(), "beta");
        assert_eq!(source.fetch("alpha").unwrap().id, "alpha");
        assert!(source.fetch("gamma").unwrap_err().is_lattice_unavailable());
    }

    #[test]
    fn test_directory_source_rejects_path_ids() {
        let root = tempfile::tempdir().unwrap();
        let lattices = root.path().join("lattices");
        fs::create_dir(&lattices).unwrap();
        let outside = serde_json::to_string(&raw("secret", false)).unwrap();
        fs::write(root.path().join("secret.json"), outside).unwrap();

        let source = DirectorySource::new(&lattices);
        let escape = root.path().join("secret");
        for id in ["../secret", "..", "a/b", "a\\b", escape.to_str().unwrap(), ""] {
            let err = source.fetch(id).unwrap_err();
            assert!(err.to_string().contains("invalid lattice id"), "{}", id);
        }
    }

    #[test]
    fn test_missing_directory_unavailable() {
        let source = DirectorySource::new("/nonexistent/qbc/lattices");
        assert!(source.ids().is_empty());
        assert!(source.default_id().unwrap_err().is_lattice_unavailable());
    }
}
