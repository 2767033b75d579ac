//! LocalScore release download and installation.
//!
//! Resolves the release asset for the host platform, downloads it through a
//! [`Fetcher`], unpacks it when it is a zip archive and installs it as an
//! executable `localscore` in the install directory.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{BenchError, DownloadError};
use crate::fetch::Fetcher;
use crate::platform::Platform;

/// How a release asset is packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    /// The download is the executable itself.
    Executable,
    /// A zip archive containing the executable.
    Zip,
}

/// A downloadable LocalScore release for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub version: String,
    pub url: String,
    pub format: AssetFormat,
}

impl ReleaseAsset {
    /// Build the asset for `version` on `platform` from a URL template.
    pub fn resolve(
        template: &str,
        version: &str,
        platform: &Platform,
    ) -> Result<Self, BenchError> {
        if !platform.is_supported() {
            return Err(BenchError::UnsupportedPlatform {
                os: platform.os.clone(),
                arch: platform.arch.clone(),
            });
        }

        let mut url = template.replace("{version}", version);
        let format = if url.to_ascii_lowercase().ends_with(".zip") {
            AssetFormat::Zip
        } else {
            AssetFormat::Executable
        };
        if format == AssetFormat::Executable
            && platform.is_windows()
            && !url.to_ascii_lowercase().ends_with(".exe")
        {
            url.push_str(".exe");
        }

        Ok(Self {
            version: version.to_string(),
            url,
            format,
        })
    }
}

/// Downloads and installs the localscore binary.
pub struct BinaryFetcher {
    fetcher: Arc<dyn Fetcher>,
    platform: Platform,
    install_dir: PathBuf,
    url_template: String,
}

impl BinaryFetcher {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        platform: Platform,
        install_dir: impl Into<PathBuf>,
        url_template: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            platform,
            install_dir: install_dir.into(),
            url_template: url_template.into(),
        }
    }

    /// Final location of the installed binary.
    pub fn target_path(&self) -> PathBuf {
        self.install_dir.join(self.platform.binary_name())
    }

    /// Download `version` and install it, replacing any previous binary.
    pub async fn install(&self, version: &str) -> Result<PathBuf, BenchError> {
        let asset = ReleaseAsset::resolve(&self.url_template, version, &self.platform)?;
        info!(version, url = %asset.url, "Downloading localscore");

        tokio::fs::create_dir_all(&self.install_dir).await?;
        let staged = self.install_dir.join(format!("localscore-{version}"));

        let result = self.stage_and_replace(&asset, &staged).await;
        if result.is_err()
            && let Err(rm) = tokio::fs::remove_file(&staged).await
            && rm.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %staged.display(), error = %rm, "Failed to remove staged binary");
        }
        result
    }

    async fn stage_and_replace(
        &self,
        asset: &ReleaseAsset,
        staged: &Path,
    ) -> Result<PathBuf, BenchError> {
        let bytes = match asset.format {
            AssetFormat::Executable => self.fetcher.download(&asset.url, staged).await?,
            AssetFormat::Zip => {
                let archive = self.fetcher.get(&asset.url).await?;
                let binary = extract_binary(&archive, self.platform.binary_name())?;
                tokio::fs::write(staged, &binary).await?;
                binary.len() as u64
            }
        };
        make_executable(staged)?;

        let target = self.target_path();
        if target.exists() {
            std::fs::remove_file(&target)?;
        }
        std::fs::rename(staged, &target)?;

        info!(path = %target.display(), bytes, "Installed localscore");
        Ok(target)
    }
}

/// Pull the executable out of a zip archive.
///
/// Picks the entry whose file name equals `binary_name`, or the only file
/// entry when the archive holds exactly one.
pub fn extract_binary(archive: &[u8], binary_name: &str) -> Result<Bytes, DownloadError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).map_err(archive_error)?;

    let mut files = Vec::new();
    for i in 0..zip.len() {
        let entry = zip.by_index(i).map_err(archive_error)?;
        if entry.is_file() {
            files.push((i, entry.name().to_string()));
        }
    }
    debug!(entries = files.len(), "Opened release archive");

    let index = files
        .iter()
        .find(|(_, name)| {
            Path::new(name)
                .file_name()
                .is_some_and(|f| f.to_string_lossy() == binary_name)
        })
        .or(if files.len() == 1 { files.first() } else { None })
        .map(|(i, _)| *i)
        .ok_or_else(|| DownloadError::Archive {
            message: format!("{binary_name} not found in archive"),
        })?;

    let mut entry = zip.by_index(index).map_err(archive_error)?;
    let mut out = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut out)?;
    Ok(Bytes::from(out))
}

fn archive_error(e: zip::result::ZipError) -> DownloadError {
    DownloadError::Archive {
        message: e.to_string(),
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)?.permissions().mode();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | 0o111))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
