//! Source file loading restricted to allowed directories
//!
//! `FileReader` keeps the text of every loaded source unit together with the
//! canonical file it came from. Reads resolve relative to a base path and
//! are refused unless the resolved file lies inside one of the allowed
//! directories.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// The only read kind the reader serves
pub const SOURCE_KIND: &str = "source";

const FILE_URI_PREFIX: &str = "file://";

/// Why a read was refused
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("file reader cannot serve reads of kind `{kind}`")]
    UnsupportedKind { kind: String },

    #[error("file outside of allowed directories: {}", path.display())]
    OutsideAllowedDirectories { path: PathBuf },

    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("not a valid file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Loads source units from the local filesystem
#[derive(Debug, Default)]
pub struct FileReader {
    base_path: PathBuf,
    allowed_directories: BTreeSet<PathBuf>,
    /// Source unit name -> text
    source_codes: BTreeMap<String, String>,
    /// Source unit name -> canonical file path
    origins: BTreeMap<String, PathBuf>,
}

impl FileReader {
    pub fn new(base_path: impl Into<PathBuf>, allowed_directories: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            allowed_directories: allowed_directories.into_iter().collect(),
            source_codes: BTreeMap::new(),
            origins: BTreeMap::new(),
        }
    }

    pub fn set_base_path(&mut self, path: impl Into<PathBuf>) {
        self.base_path = path.into();
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn allow_directory(&mut self, path: impl Into<PathBuf>) {
        self.allowed_directories.insert(path.into());
    }

    pub fn allowed_directories(&self) -> &BTreeSet<PathBuf> {
        &self.allowed_directories
    }

    pub fn source_codes(&self) -> &BTreeMap<String, String> {
        &self.source_codes
    }

    /// Canonical file path of every source unit read from disk
    pub fn origins(&self) -> &BTreeMap<String, PathBuf> {
        &self.origins
    }

    pub fn source_code(&self, unit: &str) -> Option<&str> {
        self.source_codes.get(unit).map(String::as_str)
    }

    /// Replace every known source; origins are forgotten
    pub fn set_sources(&mut self, sources: BTreeMap<String, String>) {
        self.source_codes = sources;
        self.origins.clear();
    }

    pub fn set_source(&mut self, unit: impl Into<String>, text: impl Into<String>) {
        self.set_source_with_origin(unit, None, text);
    }

    pub fn set_source_with_origin(&mut self, unit: impl Into<String>, origin: Option<PathBuf>, text: impl Into<String>) {
        let unit = unit.into();
        match origin {
            Some(origin) => {
                self.origins.insert(unit.clone(), origin);
            }
            None => {
                self.origins.remove(&unit);
            }
        }
        self.source_codes.insert(unit, text.into());
    }

    /// Read the source unit `path` from disk.
    ///
    /// `kind` must be [`SOURCE_KIND`]. A leading `file://` is ignored. On
    /// success the text is kept under `path` as given.
    pub fn read_file(&mut self, kind: &str, path: &str) -> Result<String, ReadError> {
        if kind != SOURCE_KIND {
            return Err(ReadError::UnsupportedKind { kind: kind.to_string() });
        }

        let stripped = path.strip_prefix(FILE_URI_PREFIX).unwrap_or(path);
        let resolved = weakly_canonical(&self.base_path.join(stripped)).map_err(|source| ReadError::Io {
            path: PathBuf::from(stripped),
            source,
        })?;

        if !self.is_allowed(&resolved) {
            return Err(ReadError::OutsideAllowedDirectories { path: resolved });
        }
        if !resolved.exists() {
            return Err(ReadError::NotFound { path: resolved });
        }
        if !resolved.is_file() {
            return Err(ReadError::NotAFile { path: resolved });
        }

        let text = std::fs::read_to_string(&resolved).map_err(|source| ReadError::Io {
            path: resolved.clone(),
            source,
        })?;
        tracing::debug!(unit = path, origin = %resolved.display(), bytes = text.len(), "read source");

        self.source_codes.insert(path.to_string(), text.clone());
        self.origins.insert(path.to_string(), resolved);
        Ok(text)
    }

    fn is_allowed(&self, path: &Path) -> bool {
        self.allowed_directories.iter().any(|directory| {
            let directory = weakly_canonical(directory).unwrap_or_else(|_| directory.clone());
            path.starts_with(&directory)
        })
    }
}

/// Canonicalise the longest existing prefix of `path` and append the rest
/// after resolving `.` and `..` lexically.
fn weakly_canonical(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(canonical) => {
                let mut result = canonical;
                for component in rest.into_iter().rev() {
                    push_component(&mut result, component);
                }
                return Ok(result);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.components().next_back()) else {
                    return Ok(absolute.clone());
                };
                rest.push(name);
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}

fn push_component(path: &mut PathBuf, component: Component<'_>) {
    match component {
        Component::CurDir => {}
        Component::ParentDir => {
            path.pop();
        }
        other => path.push(other.as_os_str()),
    }
}
