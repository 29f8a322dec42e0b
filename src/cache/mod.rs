use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::tile::TileIndex;

/// On-disk tile cache, namespaced by tile server and zoom level.
///
/// Tile content is immutable for a given (z, x, y) on one server, so the cache
/// can be shared between renders.
#[derive(Clone, Debug)]
pub struct TileCache {
    root_dir: PathBuf,
    namespace_dir: PathBuf,
}

impl TileCache {
    /// Create a cache under `cache_dir` for tiles from `url_template`
    pub fn new<P: AsRef<Path>>(cache_dir: P, url_template: &str) -> Result<Self> {
        let root_dir = cache_dir.as_ref().to_path_buf();
        let namespace_dir = root_dir.join(namespace(url_template));

        fs::create_dir_all(&namespace_dir).map_err(|e| Error::io(&namespace_dir, e))?;

        Ok(Self { root_dir, namespace_dir })
    }

    /// Directory holding the tiles of one zoom level
    pub fn zoom_dir(&self, zoom: u8) -> PathBuf {
        self.namespace_dir.join(zoom.to_string())
    }

    pub fn tile_path(&self, zoom: u8, tile: TileIndex) -> PathBuf {
        self.zoom_dir(zoom).join(tile_file_name(tile))
    }

    /// Path of a cached tile, or None if it has not been downloaded yet
    pub fn get_cached_tile(&self, zoom: u8, tile: TileIndex) -> Option<PathBuf> {
        let path = self.tile_path(zoom, tile);
        path.is_file().then_some(path)
    }

    /// Store tile bytes. The file appears under its final name only once it is
    /// completely written.
    pub fn save_tile(&self, zoom: u8, tile: TileIndex, data: &[u8]) -> Result<PathBuf> {
        let path = self.tile_path(zoom, tile);
        write_atomic(&path, |file| file.write_all(data))?;
        Ok(path)
    }

    /// Remove every cached tile, for all servers
    pub fn clear(&self) -> Result<()> {
        if self.root_dir.exists() {
            fs::remove_dir_all(&self.root_dir).map_err(|e| Error::io(&self.root_dir, e))?;
        }
        fs::create_dir_all(&self.namespace_dir).map_err(|e| Error::io(&self.namespace_dir, e))?;
        Ok(())
    }
}

/// `{x}_{y}.jpeg`
pub fn tile_file_name(tile: TileIndex) -> String {
    format!("{}_{}.jpeg", tile.x, tile.y)
}

fn namespace(url_template: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url_template.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    hash[..16].to_string()
}

/// Write a file through a temporary sibling and rename it into place, so
/// readers never see a partial file and failures leave nothing behind.
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> std::io::Result<()>,
{
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let mut file = NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    write(&mut file).map_err(|e| Error::io(path, e))?;
    file.flush().map_err(|e| Error::io(path, e))?;
    file.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// Write several files so that either all of them end up in place or none do.
///
/// Every file is staged next to its target first; files already renamed into
/// place are removed again if a later rename fails.
pub(crate) fn write_all_atomic(files: &[(&Path, &[u8])]) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for &(path, data) in files {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

        let mut file = NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
        file.write_all(data).map_err(|e| Error::io(path, e))?;
        file.flush().map_err(|e| Error::io(path, e))?;
        staged.push((path, file));
    }

    let mut persisted: Vec<&Path> = Vec::with_capacity(staged.len());
    for (path, file) in staged {
        if let Err(e) = file.persist(path) {
            for done in persisted {
                let _ = fs::remove_file(done);
            }
            return Err(Error::io(path, e.error));
        }
        persisted.push(path);
    }
    Ok(())
}
