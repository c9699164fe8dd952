//! Fetching source files and locating the file a source loads.
//!
//! Remote sources are cached under the downloads directory and only
//! transferred again when the server reports a different size. Zip archives,
//! whether downloaded or local, are extracted next to the archive and the
//! extraction is reused while it is at least as new as the archive.

mod archive;
mod remote;
#[doc(hidden)]
pub mod test_support;

use camino::{Utf8Path, Utf8PathBuf};
use gazetteer_core::{SourceConfig, SourceLocation};
use std::cell::OnceCell;
use std::io;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use url::Url;

pub use remote::{
    DEFAULT_USER_AGENT, HttpRemoteSource, HttpRemoteSourceConfig, RemoteSource, TransportError,
};

/// Errors raised while acquiring a source file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AcquisitionError {
    /// A local source path does not exist.
    #[error("local source path {path} does not exist")]
    MissingLocalPath { path: Utf8PathBuf },
    /// The expected file was not found in the acquired location.
    #[error("target file {target:?} not found in {location}")]
    TargetNotFound {
        target: String,
        location: Utf8PathBuf,
    },
    /// A remote location is not a URL with a file name.
    #[error("invalid source url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
    /// The transfer failed.
    #[error("failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: TransportError,
    },
    /// A zip archive could not be read.
    #[error("failed to extract archive {path}")]
    Extract {
        path: Utf8PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    /// A filesystem operation failed.
    #[error("filesystem error at {path}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// The runtime driving network I/O could not be created.
    #[error("failed to build Tokio runtime")]
    Runtime {
        #[source]
        source: io::Error,
    },
    /// A download was requested from inside a current-thread runtime, which
    /// cannot be blocked without stalling its own I/O.
    #[error("remote sources cannot be fetched from inside a current-thread Tokio runtime")]
    CurrentThreadRuntime,
}

/// Resolves each source to the local file it loads.
///
/// Transfers are async underneath but [`Acquirer::acquire`] blocks. Inside a
/// multi-thread Tokio runtime the transfer runs on that runtime through
/// [`tokio::task::block_in_place`]. Outside any runtime it runs on a private
/// current-thread runtime, built on first use and reused for every later
/// fetch.
pub struct Acquirer<'a> {
    remote: &'a dyn RemoteSource,
    downloads_dir: Utf8PathBuf,
    runtime: OnceCell<Runtime>,
}

impl std::fmt::Debug for Acquirer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquirer")
            .field("remote", &"<dyn RemoteSource>")
            .field("downloads_dir", &self.downloads_dir)
            .field("runtime", &self.runtime.get().map(|_| "<tokio::runtime::Runtime>"))
            .finish()
    }
}

impl<'a> Acquirer<'a> {
    /// Create an acquirer that caches downloads in `downloads_dir`.
    pub fn new(remote: &'a dyn RemoteSource, downloads_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            remote,
            downloads_dir: downloads_dir.into(),
            runtime: OnceCell::new(),
        }
    }

    /// Directory holding cached downloads.
    #[must_use]
    pub fn downloads_dir(&self) -> &Utf8Path {
        &self.downloads_dir
    }

    /// Fetch or locate the source and return the path of its target file.
    ///
    /// The returned path may be a directory when an extracted directory is
    /// itself named after the target.
    ///
    /// # Errors
    /// Returns [`AcquisitionError::MissingLocalPath`] for an absent local
    /// path, [`AcquisitionError::TargetNotFound`] when the target file is not
    /// present, [`AcquisitionError::CurrentThreadRuntime`] when a download
    /// is needed while a current-thread runtime is active, and transport or
    /// filesystem errors otherwise.
    pub fn acquire(&self, source: &SourceConfig) -> Result<Utf8PathBuf, AcquisitionError> {
        let location = match source.location() {
            SourceLocation::Remote(url) => self.fetch(url)?,
            SourceLocation::Local(path) => {
                let exists = gazetteer_fs::metadata(path)
                    .map_err(|source| AcquisitionError::Io {
                        path: path.clone(),
                        source,
                    })?
                    .is_some();
                if !exists {
                    return Err(AcquisitionError::MissingLocalPath { path: path.clone() });
                }
                path.clone()
            }
        };
        resolve_target(&location, source.file())
    }

    fn fetch(&self, url: &str) -> Result<Utf8PathBuf, AcquisitionError> {
        let destination = self.downloads_dir.join(url_file_name(url)?);
        let transfer = self.fetch_into(url, &destination);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(transfer))?;
            }
            Ok(_) => return Err(AcquisitionError::CurrentThreadRuntime),
            Err(_) => self.runtime()?.block_on(transfer)?,
        }
        Ok(destination)
    }

    fn runtime(&self) -> Result<&Runtime, AcquisitionError> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime);
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| AcquisitionError::Runtime { source })?;
        Ok(self.runtime.get_or_init(|| runtime))
    }

    async fn fetch_into(&self, url: &str, destination: &Utf8Path) -> Result<(), AcquisitionError> {
        let io_error = |source| AcquisitionError::Io {
            path: destination.to_path_buf(),
            source,
        };
        let cached = gazetteer_fs::file_size(destination)
            .map_err(io_error)?
            .filter(|size| *size > 0);
        if let Some(local) = cached {
            match self.remote.content_length(url).await {
                Ok(Some(remote)) if remote == local => {
                    log::info!("using cached {destination} ({local} bytes)");
                    return Ok(());
                }
                Ok(remote) => {
                    log::info!("cached {destination} is stale (local {local}, remote {remote:?})");
                }
                Err(err) => log::warn!("failed to probe {url}, downloading anyway: {err}"),
            }
        }

        log::info!("downloading {url} to {destination}");
        let mut file = gazetteer_fs::create_utf8_file(destination).map_err(io_error)?;
        match self.remote.download(url, &mut file).await {
            Ok(bytes) => {
                log::info!("downloaded {bytes} bytes from {url}");
                Ok(())
            }
            Err(source) => {
                drop(file);
                if let Err(err) = gazetteer_fs::remove_file(destination) {
                    log::warn!("failed to remove partial download {destination}: {err}");
                }
                Err(AcquisitionError::Download {
                    url: url.to_owned(),
                    source,
                })
            }
        }
    }
}

/// Last non-empty path segment of `url`.
fn url_file_name(url: &str) -> Result<String, AcquisitionError> {
    let invalid = |message: String| AcquisitionError::InvalidUrl {
        url: url.to_owned(),
        message,
    };
    let parsed = Url::parse(url).map_err(|err| invalid(err.to_string()))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()))
        .map(str::to_owned)
        .ok_or_else(|| invalid("url has no file name".to_owned()))
}

/// Locate `target` within an acquired file or directory, extracting zip
/// archives on the way.
fn resolve_target(location: &Utf8Path, target: &str) -> Result<Utf8PathBuf, AcquisitionError> {
    let io_error = |path: &Utf8Path| {
        let path = path.to_path_buf();
        move |source| AcquisitionError::Io { path, source }
    };
    let not_found = |location: &Utf8Path| AcquisitionError::TargetNotFound {
        target: target.to_owned(),
        location: location.to_path_buf(),
    };

    if gazetteer_fs::is_dir(location).map_err(io_error(location))? {
        return gazetteer_fs::find_file_named(location, target)
            .map_err(io_error(location))?
            .ok_or_else(|| not_found(location));
    }

    if !archive::is_zip(location)? {
        return if location.file_name() == Some(target) {
            Ok(location.to_path_buf())
        } else {
            Err(not_found(location))
        };
    }

    let extracted = archive::extraction_dir(location);
    if gazetteer_fs::is_dir(&extracted).map_err(io_error(&extracted))? {
        if extracted.file_name() == Some(target) && archive::is_current(location, &extracted)? {
            log::info!("reusing extracted directory {extracted}");
            return Ok(extracted);
        }
        let found =
            gazetteer_fs::find_file_named(&extracted, target).map_err(io_error(&extracted))?;
        if let Some(found) = found {
            if archive::is_current(location, &found)? {
                log::info!("reusing extracted {found}");
                return Ok(found);
            }
        }
        gazetteer_fs::remove_dir_all(&extracted).map_err(io_error(&extracted))?;
    }

    archive::extract(location, &extracted)?;
    if extracted.file_name() == Some(target) {
        return Ok(extracted);
    }
    gazetteer_fs::find_file_named(&extracted, target)
        .map_err(io_error(&extracted))?
        .ok_or_else(|| not_found(&extracted))
}
