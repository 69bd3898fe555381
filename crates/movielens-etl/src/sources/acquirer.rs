//! Dataset download and archive extraction

use async_trait::async_trait;
use futures::StreamExt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use zip::read::ZipArchive;

use crate::config::DownloadConfig;
use crate::errors::AcquisitionError;
use crate::utils::human_format::{format_bytes, format_duration_precise};

/// Fetches a dataset archive and makes it available on local disk
#[async_trait]
pub trait DatasetAcquirer: Send + Sync {
    /// Download `url` to `{datasets_dir}/{zip_name}`, extract it into
    /// `datasets_dir` and return the extracted dataset directory.
    async fn acquire(
        &self,
        url: &str,
        datasets_dir: &Path,
        zip_name: &str,
    ) -> Result<PathBuf, AcquisitionError>;
}

pub struct HttpDatasetAcquirer {
    client: reqwest::Client,
}

impl HttpDatasetAcquirer {
    pub fn new(config: &DownloadConfig) -> Result<Self, AcquisitionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| AcquisitionError::Download {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<u64, AcquisitionError> {
        debug!("Downloading {} to {:?}", url, destination);
        let download_error = |source| AcquisitionError::Download {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(download_error)?;
        if !response.status().is_success() {
            return Err(AcquisitionError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let total_size = response.content_length();

        let mut file = tokio::fs::File::create(destination).await?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(download_error)?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;

        if let Some(total) = total_size {
            debug!("Downloaded {} of {} bytes", downloaded, total);
        }
        Ok(downloaded)
    }
}

#[async_trait]
impl DatasetAcquirer for HttpDatasetAcquirer {
    async fn acquire(
        &self,
        url: &str,
        datasets_dir: &Path,
        zip_name: &str,
    ) -> Result<PathBuf, AcquisitionError> {
        let started = Instant::now();
        tokio::fs::create_dir_all(datasets_dir).await?;

        let zip_path = datasets_dir.join(zip_name);
        let downloaded = self.download(url, &zip_path).await?;
        info!(
            "Dataset downloaded: url={} size={} duration={}",
            url,
            format_bytes(downloaded),
            format_duration_precise(started.elapsed())
        );

        let archive = zip_path.clone();
        let target = datasets_dir.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || extract_archive(&archive, &target))
            .await
            .map_err(|e| AcquisitionError::Extraction {
                path: zip_path.clone(),
                message: e.to_string(),
            })??;
        info!("Extracted {} entries from {:?}", extracted, zip_path);

        let stem = Path::new(zip_name)
            .file_stem()
            .ok_or_else(|| AcquisitionError::Extraction {
                path: zip_path.clone(),
                message: "archive name has no file stem".to_string(),
            })?;
        let dataset_dir = datasets_dir.join(stem);
        if !dataset_dir.is_dir() {
            return Err(AcquisitionError::Extraction {
                path: zip_path,
                message: format!("archive did not contain a '{}' directory", stem.to_string_lossy()),
            });
        }
        Ok(dataset_dir)
    }
}

/// Unpack every entry of `archive` under `target`; returns the file count.
///
/// Entries whose names would escape `target` are rejected.
pub fn extract_archive(archive: &Path, target: &Path) -> Result<usize, AcquisitionError> {
    let extraction_error = |message: String| AcquisitionError::Extraction {
        path: archive.to_path_buf(),
        message,
    };

    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file).map_err(|e| extraction_error(e.to_string()))?;
    let mut files = 0;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| extraction_error(e.to_string()))?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| extraction_error(format!("unsafe entry name '{}'", entry.name())))?;
        let out_path = target.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        files += 1;
    }

    Ok(files)
}
