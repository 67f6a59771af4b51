//! Model weight management
//!
//! Locates classifier weights on disk and downloads them into a local cache
//! on first use when a download URL is configured.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Manages classifier weight downloads and caching
pub struct ModelManager {
    /// Directory where downloaded weights are cached
    cache_dir: PathBuf,
}

impl ModelManager {
    /// Create a ModelManager with the default cache directory
    ///
    /// Default location: `~/.cache/chirp/models/`
    pub fn new() -> Result<Self> {
        let cache_dir = Self::default_cache_dir()?;
        Ok(Self { cache_dir })
    }

    /// Create a ModelManager with a custom cache directory
    pub fn with_cache_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn default_cache_dir() -> Result<PathBuf> {
        let base = dirs::cache_dir().ok_or_else(|| {
            PipelineError::InvalidConfig("Could not determine cache directory".to_string())
        })?;
        Ok(base.join("chirp").join("models"))
    }

    /// Resolve the weights file, downloading it if necessary.
    ///
    /// If `model_path` already exists it is used as-is. Otherwise, when
    /// `model_url` is set, the weights are fetched into the cache directory
    /// and the cached path is returned. A missing file with no URL is an
    /// error the caller should treat as fatal.
    pub fn ensure_model(&self, model_path: &Path, model_url: Option<&str>) -> Result<PathBuf> {
        if model_path.exists() {
            log::info!("Model weights found at {:?}", model_path);
            return Ok(model_path.to_path_buf());
        }

        let url = match model_url {
            Some(url) => url,
            None => {
                return Err(PipelineError::ModelNotFound(
                    model_path.display().to_string(),
                ))
            }
        };

        let file_name = model_path
            .file_name()
            .ok_or_else(|| {
                PipelineError::InvalidConfig(format!(
                    "Model path has no file name: {}",
                    model_path.display()
                ))
            })?
            .to_os_string();
        let cached = self.cache_dir.join(file_name);

        if cached.exists() {
            log::info!("Model weights found in cache at {:?}", cached);
            return Ok(cached);
        }

        self.download_file(url, &cached)?;
        Ok(cached)
    }

    /// Download a file from a URL into the cache directory
    fn download_file(&self, url: &str, target_path: &Path) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).map_err(PipelineError::Io)?;

        // Write to a temp file first so a partial download never occupies
        // the final path
        let temp_path = target_path.with_extension("tmp");

        log::info!("Downloading {} to {:?}", url, target_path);

        let response = ureq::get(url)
            .call()
            .map_err(|e| PipelineError::ModelDownloadFailed(e.to_string()))?;

        let content_length: Option<u64> = response
            .header("Content-Length")
            .and_then(|s| s.parse().ok());

        let mut file = fs::File::create(&temp_path).map_err(PipelineError::Io)?;

        let mut reader = response.into_reader();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = reader.read(&mut buffer).map_err(PipelineError::Io)?;
            if bytes_read == 0 {
                break;
            }
            file.write_all(&buffer[..bytes_read])
                .map_err(PipelineError::Io)?;
        }

        file.flush().map_err(PipelineError::Io)?;
        drop(file);

        // Verify download size
        let actual_size = fs::metadata(&temp_path).map_err(PipelineError::Io)?.len();
        if let Some(expected) = content_length {
            if actual_size != expected {
                fs::remove_file(&temp_path).ok();
                return Err(PipelineError::ModelDownloadFailed(format!(
                    "Download incomplete: expected {} bytes, got {}",
                    expected, actual_size
                )));
            }
        }

        fs::rename(&temp_path, target_path).map_err(PipelineError::Io)?;

        log::info!(
            "Successfully downloaded {:?} ({} bytes)",
            target_path.file_name().unwrap_or_default(),
            actual_size
        );

        Ok(())
    }

    /// Delete a cached weights file
    pub fn delete_cached(&self, file_name: &str) -> Result<()> {
        let path = self.cache_dir.join(file_name);
        if path.exists() {
            fs::remove_file(&path).map_err(PipelineError::Io)?;
            log::info!("Deleted cached model: {:?}", path);
        }
        Ok(())
    }

    /// Total size of all cached weight files
    pub fn cache_size(&self) -> u64 {
        fs::read_dir(&self.cache_dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| entry.metadata().ok())
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
            .sum()
    }
}
