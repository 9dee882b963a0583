use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use spx_syntax::ast::{AstPackage, SourceFile};
use spx_syntax::PkgDoc;
use spx_types::TypeInfo;

use crate::builders::{default_registry, KIND_AST, KIND_AST_PACKAGE, KIND_PKG_DOC, KIND_TYPE_INFO};
use crate::cache::CacheEntry;
use crate::error::{ProjectError, Result};
use crate::file::File;
use crate::kind::{Artifact, Features, KindRegistry, KindScope};

type FileMap = HashMap<String, File>;
type LazyFiles = Box<dyn FnOnce() -> FileMap + Send>;

/// The initial file set handed to [`Project::new`].
pub enum InitialFiles {
    Empty,
    Eager(FileMap),
    /// Evaluated exactly once, on first access to the project.
    Lazy(LazyFiles),
}

impl InitialFiles {
    pub fn lazy(load: impl FnOnce() -> FileMap + Send + 'static) -> Self {
        InitialFiles::Lazy(Box::new(load))
    }
}

impl Default for InitialFiles {
    fn default() -> Self {
        InitialFiles::Empty
    }
}

impl From<FileMap> for InitialFiles {
    fn from(files: FileMap) -> Self {
        InitialFiles::Eager(files)
    }
}

impl fmt::Debug for InitialFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialFiles::Empty => f.write_str("InitialFiles::Empty"),
            InitialFiles::Eager(files) => write!(f, "InitialFiles::Eager({} files)", files.len()),
            InitialFiles::Lazy(_) => f.write_str("InitialFiles::Lazy"),
        }
    }
}

/// Project configuration fixed at construction.
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    /// Extensions of files that participate in package-level kinds.
    pub source_exts: Vec<String>,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            source_exts: vec![".spx".to_string(), ".gop".to_string()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: String,
    /// `None` for project-scope kinds.
    path: Option<String>,
}

/// The in-memory model of one project: its file set plus lazily derived,
/// memoized artifacts.
///
/// Reads never take a project-wide lock; a reader blocks only while waiting
/// on the build latch of the specific entry it requested. Mutations hold the
/// writer critical section (file map, then cache map) just long enough to
/// apply the change, drop affected entries, and bump the generation, so the
/// cache is consistent again before the mutating call returns.
pub struct Project {
    files: RwLock<FileMap>,
    cache: RwLock<HashMap<CacheKey, Arc<CacheEntry>>>,
    generation: AtomicU64,
    registry: Arc<KindRegistry>,
    features: Features,
    options: Arc<ProjectOptions>,
    init: Mutex<Option<LazyFiles>>,
    initialized: AtomicBool,
}

impl Project {
    /// Create a project. `registry` of `None` selects the default registry
    /// with the four standard kinds.
    pub fn new(
        registry: Option<KindRegistry>,
        initial_files: impl Into<InitialFiles>,
        features: Features,
    ) -> Project {
        Self::with_options(registry, initial_files, features, ProjectOptions::default())
    }

    pub fn with_options(
        registry: Option<KindRegistry>,
        initial_files: impl Into<InitialFiles>,
        features: Features,
        options: ProjectOptions,
    ) -> Project {
        let registry = Arc::new(registry.unwrap_or_else(default_registry));
        let (files, init, initialized) = match initial_files.into() {
            InitialFiles::Empty => (FileMap::new(), None, true),
            InitialFiles::Eager(files) => (files, None, true),
            InitialFiles::Lazy(load) => (FileMap::new(), Some(load), false),
        };
        Project {
            files: RwLock::new(files),
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            registry,
            features,
            options: Arc::new(options),
            init: Mutex::new(init),
            initialized: AtomicBool::new(initialized),
        }
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    /// Monotonic version stamp, bumped on every mutation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn ensure_init(&self) {
        if self.initialized.load(Ordering::Acquire) {
            return;
        }
        let mut slot = self.init.lock().unwrap();
        if self.initialized.load(Ordering::Relaxed) {
            return;
        }
        if let Some(load) = slot.take() {
            let files = load();
            tracing::debug!(
                target: "spx.project",
                files = files.len(),
                "loaded initial file set"
            );
            *self.files.write().unwrap() = files;
        }
        self.initialized.store(true, Ordering::Release);
    }

    // --- file store -------------------------------------------------------

    pub fn get_file(&self, path: &str) -> Result<File> {
        self.ensure_init();
        self.files
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or(ProjectError::NotFound)
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.ensure_init();
        self.files.read().unwrap().contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.ensure_init();
        self.files.read().unwrap().len()
    }

    /// Insert or replace the file at `path`.
    pub fn put_file(&self, path: impl Into<String>, file: File) {
        self.ensure_init();
        let path = path.into();
        let mut files = self.files.write().unwrap();
        files.insert(path.clone(), file);
        self.invalidate_and_bump(&[path.as_str()]);
    }

    pub fn delete_file(&self, path: &str) -> Result<()> {
        self.ensure_init();
        let mut files = self.files.write().unwrap();
        if files.remove(path).is_none() {
            return Err(ProjectError::NotFound);
        }
        self.invalidate_and_bump(&[path]);
        Ok(())
    }

    /// Atomically relocate `from` to `to`: one generation bump, one
    /// invalidation pass covering both paths. Renaming onto an existing path
    /// is refused.
    pub fn rename_file(&self, from: &str, to: &str) -> Result<()> {
        self.ensure_init();
        let mut files = self.files.write().unwrap();
        if !files.contains_key(from) {
            return Err(ProjectError::NotFound);
        }
        if files.contains_key(to) {
            return Err(ProjectError::AlreadyExists);
        }
        let file = files.remove(from).expect("presence checked above");
        files.insert(to.to_string(), file);
        self.invalidate_and_bump(&[from, to]);
        Ok(())
    }

    /// Replace the whole file set: every path missing from `new_files` is
    /// deleted, every path present is put. One generation bump; invalidation
    /// covers the union of old and new paths.
    pub fn update_files(&self, new_files: FileMap) {
        self.ensure_init();
        let mut files = self.files.write().unwrap();
        let mut touched: HashSet<String> = files.keys().cloned().collect();
        touched.extend(new_files.keys().cloned());
        *files = new_files;
        let touched: Vec<&str> = touched.iter().map(String::as_str).collect();
        self.invalidate_and_bump(&touched);
    }

    /// Visit every path in the store. The visited set is the path set at
    /// call entry; mutations during iteration do not surface. Returning
    /// `false` stops early. Iteration order is unspecified.
    pub fn range_files(&self, mut visit: impl FnMut(&str) -> bool) {
        self.ensure_init();
        let paths: Vec<String> = self.files.read().unwrap().keys().cloned().collect();
        for path in paths {
            if !visit(&path) {
                break;
            }
        }
    }

    /// Like [`Project::range_files`], but hands the visitor the file handle
    /// as well.
    pub fn range_file_contents(&self, mut visit: impl FnMut(&str, &File) -> bool) {
        self.ensure_init();
        let entries: Vec<(String, File)> = self
            .files
            .read()
            .unwrap()
            .iter()
            .map(|(path, file)| (path.clone(), file.clone()))
            .collect();
        for (path, file) in entries {
            if !visit(&path, &file) {
                break;
            }
        }
    }

    // --- artifact cache ---------------------------------------------------

    /// Fetch or build the project-scope artifact for `kind`.
    pub fn cache(&self, kind: &str) -> Result<Artifact> {
        self.artifact(kind, None)
    }

    /// Fetch or build the file-scope artifact for `(kind, path)`.
    pub fn file_cache(&self, kind: &str, path: &str) -> Result<Artifact> {
        self.artifact(kind, Some(path))
    }

    fn artifact(&self, kind: &str, path: Option<&str>) -> Result<Artifact> {
        self.ensure_init();
        let Some(spec) = self.registry.get(kind) else {
            return Err(ProjectError::UnknownKind);
        };
        if !self.features.contains(spec.feature) {
            return Err(ProjectError::UnknownKind);
        }
        let scope_ok = match spec.scope {
            KindScope::File => path.is_some(),
            KindScope::Project => path.is_none(),
        };
        if !scope_ok {
            return Err(ProjectError::UnknownKind);
        }

        let key = CacheKey {
            kind: kind.to_string(),
            path: path.map(str::to_string),
        };
        let entry = self.entry(key);
        debug_assert!(entry.generation() <= self.generation());

        let builder = spec.builder.clone();
        let key_path = path.unwrap_or_default();
        entry.force(|| {
            tracing::trace!(target: "spx.project", kind, path = key_path, "building artifact");
            builder(ProjectView { project: self }, key_path)
        })
    }

    fn entry(&self, key: CacheKey) -> Arc<CacheEntry> {
        if let Some(entry) = self.cache.read().unwrap().get(&key) {
            return Arc::clone(entry);
        }
        let mut cache = self.cache.write().unwrap();
        let generation = self.generation();
        Arc::clone(
            cache
                .entry(key)
                .or_insert_with(|| Arc::new(CacheEntry::new(generation))),
        )
    }

    /// Drop affected entries and bump the generation. Callers hold the file
    /// map write guard, which makes the file change, the invalidation, and
    /// the bump one writer critical section.
    fn invalidate_and_bump(&self, touched: &[&str]) {
        let mut cache = self.cache.write().unwrap();
        let before = cache.len();
        cache.retain(|key, _| {
            match self.registry.get(&key.kind).map(|spec| spec.scope) {
                // File-scope entries survive unless their path was touched.
                Some(KindScope::File) => !key
                    .path
                    .as_deref()
                    .is_some_and(|path| touched.contains(&path)),
                // Project-scope artifacts are cross-file; any mutation drops
                // them.
                Some(KindScope::Project) | None => false,
            }
        });
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            target: "spx.project",
            generation,
            touched = touched.len(),
            dropped = before - cache.len(),
            "invalidated cache after mutation"
        );
    }

    // --- façade -----------------------------------------------------------

    /// Parsed syntax of the file at `path`.
    pub fn ast(&self, path: &str) -> Result<Arc<SourceFile>> {
        Ok(downcast(KIND_AST, self.file_cache(KIND_AST, path)?))
    }

    /// Parsed syntax of every source-extension file, ordered by path.
    /// All-or-nothing: the first parse failure is returned.
    pub fn ast_files(&self) -> Result<Vec<(String, Arc<SourceFile>)>> {
        self.ensure_init();
        let mut paths: Vec<String> = {
            let files = self.files.read().unwrap();
            files
                .keys()
                .filter(|path| self.is_source_file(path.as_str()))
                .cloned()
                .collect()
        };
        paths.sort();
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            let ast = self.ast(&path)?;
            out.push((path, ast));
        }
        Ok(out)
    }

    /// The merged package over all source files.
    pub fn ast_package(&self) -> Result<Arc<AstPackage>> {
        // This accessor reports a disabled kind by message only; pkg_doc and
        // type_info keep the sentinel.
        let value = self.cache(KIND_AST_PACKAGE).map_err(|err| match err {
            ProjectError::UnknownKind => ProjectError::build(err.to_string()),
            other => other,
        })?;
        Ok(downcast(KIND_AST_PACKAGE, value))
    }

    /// Type-checking result over the merged package.
    pub fn type_info(&self) -> Result<Arc<TypeInfo>> {
        Ok(downcast(KIND_TYPE_INFO, self.cache(KIND_TYPE_INFO)?))
    }

    /// Documentation index over the merged package.
    pub fn pkg_doc(&self) -> Result<Arc<PkgDoc>> {
        Ok(downcast(KIND_PKG_DOC, self.cache(KIND_PKG_DOC)?))
    }

    /// Visit parsed source files in lexicographic path order. Returning
    /// `false` stops early.
    pub fn range_ast_files(
        &self,
        mut visit: impl FnMut(&str, &Arc<SourceFile>) -> bool,
    ) -> Result<()> {
        let pkg = self.ast_package()?;
        for (path, file) in &pkg.files {
            if !visit(path, file) {
                break;
            }
        }
        Ok(())
    }

    pub fn is_source_file(&self, path: &str) -> bool {
        self.options
            .source_exts
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }

    // --- snapshot ---------------------------------------------------------

    /// A point-in-time view of this project.
    ///
    /// File handles and built artifacts are shared by reference; only the
    /// two top-level maps are cloned. The snapshot is itself a [`Project`]:
    /// it may be mutated, and mutations on either side never affect the
    /// other.
    pub fn snapshot(&self) -> Project {
        self.ensure_init();
        // Both read guards are held together so the copied file set and
        // cache form a consistent cut; mutations take the write side of both.
        let files = self.files.read().unwrap();
        let cache = self.cache.read().unwrap();
        let snapshot = Project {
            files: RwLock::new(files.clone()),
            cache: RwLock::new(cache.clone()),
            generation: AtomicU64::new(self.generation()),
            registry: Arc::clone(&self.registry),
            features: self.features,
            options: Arc::clone(&self.options),
            init: Mutex::new(None),
            initialized: AtomicBool::new(true),
        };
        tracing::debug!(
            target: "spx.project",
            generation = snapshot.generation(),
            files = files.len(),
            "took project snapshot"
        );
        snapshot
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("files", &self.files.read().unwrap().len())
            .field("generation", &self.generation())
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

fn downcast<T: Send + Sync + 'static>(kind: &str, value: Artifact) -> Arc<T> {
    value
        .downcast::<T>()
        .unwrap_or_else(|_| panic!("artifact for kind {kind:?} has unexpected type"))
}

/// Read-only capability over a project, handed to builders.
///
/// The view exposes lookups, cache re-entry, and iteration but none of the
/// mutating surface, so a builder cannot invalidate the entry it is
/// currently computing. Views are borrowed for the duration of one build and
/// must not be stored inside produced artifacts.
#[derive(Clone, Copy)]
pub struct ProjectView<'a> {
    pub(crate) project: &'a Project,
}

impl ProjectView<'_> {
    pub fn get_file(&self, path: &str) -> Result<File> {
        self.project.get_file(path)
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.project.contains_file(path)
    }

    pub fn file_count(&self) -> usize {
        self.project.file_count()
    }

    pub fn range_files(&self, visit: impl FnMut(&str) -> bool) {
        self.project.range_files(visit)
    }

    pub fn range_file_contents(&self, visit: impl FnMut(&str, &File) -> bool) {
        self.project.range_file_contents(visit)
    }

    pub fn cache(&self, kind: &str) -> Result<Artifact> {
        self.project.cache(kind)
    }

    pub fn file_cache(&self, kind: &str, path: &str) -> Result<Artifact> {
        self.project.file_cache(kind, path)
    }

    pub fn ast(&self, path: &str) -> Result<Arc<SourceFile>> {
        self.project.ast(path)
    }

    pub fn ast_files(&self) -> Result<Vec<(String, Arc<SourceFile>)>> {
        self.project.ast_files()
    }

    pub fn ast_package(&self) -> Result<Arc<AstPackage>> {
        self.project.ast_package()
    }

    pub fn features(&self) -> Features {
        self.project.features()
    }

    pub fn generation(&self) -> u64 {
        self.project.generation()
    }

    pub fn options(&self) -> &ProjectOptions {
        self.project.options()
    }

    pub fn is_source_file(&self, path: &str) -> bool {
        self.project.is_source_file(path)
    }
}

impl fmt::Debug for ProjectView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProjectView").field(self.project).finish()
    }
}
