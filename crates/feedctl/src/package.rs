//! Local package archives (`.nupkg`).
//!
//! A package is a zip archive carrying a `<id>.nuspec` manifest at its root.
//! Only the identity (id + version) is read from it; the archive itself is
//! streamed to the feed untouched.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

pub const PACKAGE_EXTENSION: &str = "nupkg";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("package file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read package file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a valid package archive", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{} has no .nuspec manifest", path.display())]
    MissingManifest { path: PathBuf },

    #[error("manifest in {} has no <{field}> element", path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("no .nupkg file found in {}", dir.display())]
    NoPackageFound { dir: PathBuf },

    #[error("found {count} .nupkg files in {}; pass the package path explicitly", dir.display())]
    AmbiguousPackage { dir: PathBuf, count: usize },
}

/// Declared identity of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub id: String,
    pub version: String,
}

impl PackageIdentity {
    /// `"<id> <version>"`.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.id, self.version)
    }
}

/// A package archive on disk.
#[derive(Debug, Clone)]
pub struct PackageArchive {
    path: PathBuf,
    len: u64,
}

impl PackageArchive {
    /// Check that `path` is a readable regular file and capture its length.
    pub fn open(path: &Path) -> Result<Self, PackageError> {
        let metadata = std::fs::metadata(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PackageError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                PackageError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        if !metadata.is_file() {
            return Err(PackageError::NotFound {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            len: metadata.len(),
        })
    }

    /// Size in bytes, from file metadata.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// File name without extension, used when the manifest cannot be read.
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Open a fresh read-only handle positioned at the start of the archive.
    pub fn open_read(&self) -> Result<File, PackageError> {
        File::open(&self.path).map_err(|source| PackageError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Read id and version from the root `.nuspec` entry.
    pub fn identity(&self) -> Result<PackageIdentity, PackageError> {
        let archive_err = |source: zip::result::ZipError| PackageError::Archive {
            path: self.path.clone(),
            source,
        };

        let reader = BufReader::new(self.open_read()?);
        let mut zip = ZipArchive::new(reader).map_err(archive_err)?;

        let mut manifest = None;
        for idx in 0..zip.len() {
            let mut entry = zip.by_index(idx).map_err(archive_err)?;
            let name = entry.name();
            if name.contains('/') || !name.to_ascii_lowercase().ends_with(".nuspec") {
                continue;
            }
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .map_err(|source| PackageError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            manifest = Some(content);
            break;
        }

        let manifest = manifest.ok_or_else(|| PackageError::MissingManifest {
            path: self.path.clone(),
        })?;

        let manifest = strip_comments(&manifest);
        let metadata = element_body(&manifest, "metadata").ok_or_else(|| PackageError::MissingField {
            path: self.path.clone(),
            field: "metadata",
        })?;

        let field = |field: &'static str| {
            element_body(metadata, field)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
                .ok_or_else(|| PackageError::MissingField {
                    path: self.path.clone(),
                    field,
                })
        };

        Ok(PackageIdentity {
            id: field("id")?,
            version: field("version")?,
        })
    }
}

/// `xml` with every `<!-- ... -->` comment removed. An unterminated comment
/// runs to the end of the document.
fn strip_comments(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        let Some(len) = rest[start + 4..].find("-->") else {
            return out;
        };
        rest = &rest[start + 4 + len + 3..];
    }
    out.push_str(rest);
    out
}

/// Content between the first `<tag ...>` and the matching `</tag>`.
/// Nested elements of the same name are not supported; manifests have none.
fn element_body<'x>(xml: &'x str, tag: &str) -> Option<&'x str> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    for (at, _) in xml.match_indices(&open) {
        let after = &xml[at + open.len()..];
        // `<idFoo>` is a different element.
        if !after.starts_with(|c: char| c == '>' || c == '/' || c.is_ascii_whitespace()) {
            continue;
        }
        let head_end = after.find('>')?;
        if after[..head_end].ends_with('/') {
            return Some("");
        }
        let body = &after[head_end + 1..];
        let end = body.find(&close)?;
        return Some(&body[..end]);
    }

    None
}

/// The single package archive in `dir`.
pub fn find_package(dir: &Path) -> Result<PathBuf, PackageError> {
    let entries = std::fs::read_dir(dir).map_err(|source| PackageError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(PACKAGE_EXTENSION))
        })
        .collect();

    match found.len() {
        0 => Err(PackageError::NoPackageFound {
            dir: dir.to_path_buf(),
        }),
        1 => Ok(found.remove(0)),
        count => Err(PackageError::AmbiguousPackage {
            dir: dir.to_path_buf(),
            count,
        }),
    }
}
