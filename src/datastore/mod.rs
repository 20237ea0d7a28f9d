//! Layered, read-mostly archive for static game data. Bound to an ordered
//! list of search paths: reads are first-hit-wins (the first path in the
//! list that contains the requested file wins), writes are last-wins (they
//! always land in the final search path, treated as the writable overlay).
//!
//! Paths given to [`DataStore`] operations are POSIX-style (`/`-separated)
//! regardless of host OS, mirroring `libcomp::DataStore`.

mod crypto;

use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub use crypto::CryptoError;

/// First four bytes every `.qmp` map file must start with.
pub const MAP_FILE_MAGIC: u32 = 0x3F80_0000;

#[derive(Debug, Error)]
pub enum DataStoreError {
    #[error("no search path contains {0}")]
    NotFound(String),
    #[error("data store has no writable search path configured")]
    NoWritablePath,
    #[error("io error accessing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("map file {0} is missing the required magic header")]
    BadMapMagic(String),
}

type Result<T> = std::result::Result<T, DataStoreError>;

#[derive(Debug, Default)]
pub struct Listing {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
    pub symlinks: Vec<String>,
}

pub struct DataStore {
    /// Ordered search paths; later entries take priority for writes and
    /// are the overlay directory new files are created in.
    search_paths: Vec<PathBuf>,
}

/// Converts a POSIX-style virtual path into a path relative to a search
/// root, rejecting attempts to escape the root via `..` components.
fn sanitize(virtual_path: &str) -> PathBuf {
    let trimmed = virtual_path.trim_start_matches('/');
    trimmed
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect()
}

impl DataStore {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn add_search_path(&mut self, path: PathBuf) {
        self.search_paths.push(path);
    }

    fn writable_root(&self) -> Result<&Path> {
        self.search_paths
            .last()
            .map(PathBuf::as_path)
            .ok_or(DataStoreError::NoWritablePath)
    }

    /// Resolves `virtual_path` to the first search path that actually has
    /// it on disk.
    fn resolve_for_read(&self, virtual_path: &str) -> Option<PathBuf> {
        let relative = sanitize(virtual_path);
        self.search_paths
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.exists())
    }

    pub fn exists(&self, virtual_path: &str) -> bool {
        self.resolve_for_read(virtual_path).is_some()
    }

    pub fn read_file(&self, virtual_path: &str) -> Result<Vec<u8>> {
        let path = self
            .resolve_for_read(virtual_path)
            .ok_or_else(|| DataStoreError::NotFound(virtual_path.to_string()))?;
        std::fs::read(&path).map_err(|source| DataStoreError::Io {
            path: virtual_path.to_string(),
            source,
        })
    }

    pub fn write_file(&self, virtual_path: &str, data: &[u8]) -> Result<()> {
        let relative = sanitize(virtual_path);
        let path = self.writable_root()?.join(&relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| DataStoreError::Io {
                path: virtual_path.to_string(),
                source,
            })?;
        }
        std::fs::write(&path, data).map_err(|source| DataStoreError::Io {
            path: virtual_path.to_string(),
            source,
        })
    }

    pub fn decrypt_file(&self, virtual_path: &str) -> Result<Vec<u8>> {
        let raw = self.read_file(virtual_path)?;
        Ok(crypto::decrypt(&raw)?)
    }

    pub fn encrypt_file(&self, virtual_path: &str, data: &[u8]) -> Result<()> {
        let encrypted = crypto::encrypt(data);
        self.write_file(virtual_path, &encrypted)
    }

    /// Reads a `.qmp` map file and validates its magic header.
    pub fn read_map_file(&self, virtual_path: &str) -> Result<Vec<u8>> {
        let data = self.read_file(virtual_path)?;
        if data.len() < 4 {
            return Err(DataStoreError::BadMapMagic(virtual_path.to_string()));
        }
        let magic = u32::from_le_bytes(data[..4].try_into().unwrap());
        if magic != MAP_FILE_MAGIC {
            return Err(DataStoreError::BadMapMagic(virtual_path.to_string()));
        }
        Ok(data)
    }

    pub fn delete(&self, virtual_path: &str, recursive: bool) -> Result<()> {
        let path = self
            .resolve_for_read(virtual_path)
            .ok_or_else(|| DataStoreError::NotFound(virtual_path.to_string()))?;
        let result = if path.is_dir() {
            if recursive {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_dir(&path)
            }
        } else {
            std::fs::remove_file(&path)
        };
        result.map_err(|source| DataStoreError::Io {
            path: virtual_path.to_string(),
            source,
        })
    }

    pub fn mkdir(&self, virtual_path: &str) -> Result<()> {
        let relative = sanitize(virtual_path);
        let path = self.writable_root()?.join(&relative);
        std::fs::create_dir_all(&path).map_err(|source| DataStoreError::Io {
            path: virtual_path.to_string(),
            source,
        })
    }

    pub fn file_size(&self, virtual_path: &str) -> Result<u64> {
        let path = self
            .resolve_for_read(virtual_path)
            .ok_or_else(|| DataStoreError::NotFound(virtual_path.to_string()))?;
        let metadata = std::fs::metadata(&path).map_err(|source| DataStoreError::Io {
            path: virtual_path.to_string(),
            source,
        })?;
        Ok(metadata.len())
    }

    pub fn sha1_hash(&self, virtual_path: &str) -> Result<String> {
        let bytes = self.read_file(virtual_path)?;
        let mut hasher = Sha1::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Lists the contents of a directory, merging entries visible across
    /// every search path (duplicates across layers are merged by name,
    /// matching first-hit-wins read semantics).
    pub fn list(&self, virtual_path: &str, recursive: bool, full_path: bool) -> Result<Listing> {
        let relative = sanitize(virtual_path);
        let mut listing = Listing::default();
        let mut seen = hashbrown::HashSet::new();

        for root in &self.search_paths {
            let dir = root.join(&relative);
            if !dir.is_dir() {
                continue;
            }

            let walker = WalkDir::new(&dir).min_depth(1).max_depth(if recursive {
                usize::MAX
            } else {
                1
            });

            for entry in walker.into_iter().filter_map(std::result::Result::ok) {
                let rel = entry
                    .path()
                    .strip_prefix(&dir)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");

                if !seen.insert(rel.clone()) {
                    continue;
                }

                let display = if full_path {
                    format!("{}/{}", virtual_path.trim_end_matches('/'), rel)
                } else {
                    rel
                };

                let file_type = entry.file_type();
                if file_type.is_symlink() {
                    listing.symlinks.push(display);
                } else if file_type.is_dir() {
                    listing.dirs.push(display);
                } else {
                    listing.files.push(display);
                }
            }
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("channel-server-datastore-test-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn first_hit_wins_for_reads() {
        let low = temp_dir("low");
        let high = temp_dir("high");
        fs::write(low.join("shared.bin"), b"low").unwrap();
        fs::write(high.join("shared.bin"), b"high").unwrap();

        let store = DataStore::new(vec![high.clone(), low.clone()]);
        assert_eq!(store.read_file("shared.bin").unwrap(), b"high");
    }

    #[test]
    fn writes_go_to_last_search_path() {
        let low = temp_dir("low2");
        let high = temp_dir("high2");
        let store = DataStore::new(vec![low.clone(), high.clone()]);
        store.write_file("new.bin", b"content").unwrap();

        assert!(high.join("new.bin").exists());
        assert!(!low.join("new.bin").exists());
    }

    #[test]
    fn decrypt_round_trips_through_store() {
        let root = temp_dir("crypt");
        let store = DataStore::new(vec![root]);
        store.encrypt_file("table.sbin", b"table bytes").unwrap();
        let decrypted = store.decrypt_file("table.sbin").unwrap();
        assert_eq!(decrypted, b"table bytes");
    }

    #[test]
    fn map_file_requires_magic() {
        let root = temp_dir("map");
        let store = DataStore::new(vec![root]);
        store.write_file("bad.qmp", b"nope").unwrap();
        assert!(store.read_map_file("bad.qmp").is_err());

        let mut good = MAP_FILE_MAGIC.to_le_bytes().to_vec();
        good.extend_from_slice(b"rest");
        store.write_file("good.qmp", &good).unwrap();
        assert!(store.read_map_file("good.qmp").is_ok());
    }

    #[test]
    fn sanitize_rejects_parent_escapes() {
        let relative = sanitize("/../../etc/passwd");
        assert_eq!(relative, PathBuf::from("etc/passwd"));
    }
}
