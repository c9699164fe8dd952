//! Locating the SpatiaLite extension shipped alongside the installer.

use camino::{Utf8Path, Utf8PathBuf};

/// Relative library path for an operating system and architecture, using
/// the names reported by [`std::env::consts`].
///
/// Returns `None` for platforms without a bundled build.
///
/// # Examples
/// ```
/// use gazetteer_data::spatialite_library;
///
/// assert_eq!(
///     spatialite_library("linux", "x86_64").as_deref(),
///     Some(camino::Utf8Path::new("linux-x86_64/mod_spatialite.so"))
/// );
/// assert_eq!(spatialite_library("linux", "riscv64"), None);
/// ```
#[must_use]
pub fn spatialite_library(os: &str, arch: &str) -> Option<Utf8PathBuf> {
    let (dir, extension) = match (os, arch) {
        ("linux", "x86_64") => ("linux-x86_64", "so"),
        ("macos", "x86_64") => ("darwin-x86_64", "dylib"),
        ("macos", "aarch64") => ("darwin-arm64", "dylib"),
        ("windows", "x86_64") => ("win-amd64", "dll"),
        _ => return None,
    };
    Some(Utf8PathBuf::from(dir).join(format!("mod_spatialite.{extension}")))
}

/// Resolve the extension for the running platform under `library_dir`.
///
/// Returns `None` when the platform is unsupported or the file is absent.
#[must_use]
pub fn resolve_spatialite(library_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let relative = spatialite_library(std::env::consts::OS, std::env::consts::ARCH)?;
    let candidate = library_dir.join(relative);
    match gazetteer_fs::is_file(&candidate) {
        Ok(true) => Some(candidate),
        Ok(false) => {
            log::debug!("no SpatiaLite library at {candidate}");
            None
        }
        Err(err) => {
            log::warn!("failed to probe SpatiaLite library {candidate}: {err}");
            None
        }
    }
}
