use std::fmt;
use std::sync::Arc;

/// Capability exposed by file handles: an immutable byte payload.
///
/// Files never change in place; "modifying" a file means putting a new handle
/// at its path. That immutability is what makes snapshots cheap: handles are
/// shared by reference between a live project and all of its snapshots.
pub trait FileContent: Send + Sync {
    fn content(&self) -> &[u8];
}

/// A shared file handle. Handles compare by identity (see [`same_file`]);
/// equal content in two handles is still two distinct files.
pub type File = Arc<dyn FileContent>;

/// The plain in-memory file implementation.
pub struct MemFile {
    content: Vec<u8>,
}

impl MemFile {
    pub fn new(content: impl Into<Vec<u8>>) -> File {
        Arc::new(Self {
            content: content.into(),
        })
    }
}

impl FileContent for MemFile {
    fn content(&self) -> &[u8] {
        &self.content
    }
}

impl fmt::Debug for MemFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemFile({} bytes)", self.content.len())
    }
}

/// Identity comparison for file handles.
pub fn same_file(a: &File, b: &File) -> bool {
    Arc::ptr_eq(a, b)
}
