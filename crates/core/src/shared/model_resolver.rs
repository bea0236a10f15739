use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model {name} not found locally and no download URL was given")]
    NotFound { name: String },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolve a model file by name against the platform cache directory.
///
/// Resolution order:
/// 1. User cache directory
/// 2. Bundled directory, if given
/// 3. Download from `url` into the cache, if given
pub fn resolve(
    name: &str,
    url: Option<&str>,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(&model_cache_dir()?, name, url, bundled_dir, progress)
}

/// Same as [`resolve`] with an explicit cache directory.
pub fn resolve_in(
    cache_dir: &Path,
    name: &str,
    url: Option<&str>,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(bundled_path) = bundled_dir.map(|dir| dir.join(name)) {
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let Some(url) = url else {
        return Err(ModelResolveError::NotFound {
            name: name.to_string(),
        });
    };

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {name} from {url}");
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceMeshLive/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceMeshLive/models/` or `~/.cache/FaceMeshLive/models/`
/// - Windows: `%LOCALAPPDATA%/FaceMeshLive/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_to(url, dest, &temp_path, progress);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_to(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ModelResolveError::Write { path, source }
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut file = fs::File::create(temp_path).map_err(write_err(temp_path))?;

    // Face-mesh models are small, but stream anyway so progress is live.
    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_err(dest))
}
