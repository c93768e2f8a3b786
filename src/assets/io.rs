use std::path::{Path, PathBuf};

/// Blob reader trait.
///
/// Reads the raw bytes behind a relative buffer URI. The binder calls it at
/// most once per distinct URI in a load pass.
pub trait BlobReader: Send + Sync {
    fn read_bytes(&self, uri: &str) -> std::io::Result<Vec<u8>>;
}

/// Local file reader rooted at the asset's directory.
#[derive(Debug, Clone)]
pub struct FileBlobReader {
    root_path: PathBuf,
}

impl FileBlobReader {
    /// Accepts either the asset directory or the path of the asset file itself.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let root_path = if path.is_file() {
            path.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        Self { root_path }
    }

    #[inline]
    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

impl BlobReader for FileBlobReader {
    fn read_bytes(&self, uri: &str) -> std::io::Result<Vec<u8>> {
        let path = self.root_path.join(uri);
        log::trace!("Reading buffer file {}", path.display());
        std::fs::read(&path)
    }
}
