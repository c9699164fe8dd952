//! Zip detection and extraction into a sibling directory.

use camino::{Utf8Path, Utf8PathBuf};
use std::io::{self, Read};
use std::time::SystemTime;
use zip::ZipArchive;

use super::AcquisitionError;

const ZIP_SIGNATURES: [[u8; 4]; 3] = [
    *b"PK\x03\x04",
    *b"PK\x05\x06",
    *b"PK\x07\x08",
];

/// Whether `path` starts with a zip signature.
pub(crate) fn is_zip(path: &Utf8Path) -> Result<bool, AcquisitionError> {
    let io_error = |source| AcquisitionError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = gazetteer_fs::open_utf8_file(path).map_err(io_error)?;
    let mut magic = [0_u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(ZIP_SIGNATURES.contains(&magic)),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(io_error(err)),
    }
}

/// Directory an archive is extracted into: its parent joined with its stem.
///
/// An archive without an extension would collide with its own stem, so it
/// gets an `_extracted` suffix instead.
pub(crate) fn extraction_dir(archive: &Utf8Path) -> Utf8PathBuf {
    let stem = archive.file_stem().unwrap_or("archive");
    let name = if archive.extension().is_some() {
        stem.to_owned()
    } else {
        format!("{stem}_extracted")
    };
    archive
        .parent()
        .map_or_else(|| Utf8PathBuf::from(&name), |parent| parent.join(&name))
}

/// Whether `extracted` is at least as recent as `archive`.
pub(crate) fn is_current(archive: &Utf8Path, extracted: &Utf8Path) -> Result<bool, AcquisitionError> {
    let archive_time = modified(archive)?;
    let extracted_time = modified(extracted)?;
    Ok(matches!(
        (archive_time, extracted_time),
        (Some(archive_time), Some(extracted_time)) if archive_time <= extracted_time
    ))
}

fn modified(path: &Utf8Path) -> Result<Option<SystemTime>, AcquisitionError> {
    gazetteer_fs::modified(path).map_err(|source| AcquisitionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Extract every entry of `archive` below `destination`.
///
/// Entries whose names escape the destination are skipped with a warning.
/// Returns the number of files written.
pub(crate) fn extract(archive: &Utf8Path, destination: &Utf8Path) -> Result<usize, AcquisitionError> {
    let zip_error = |source| AcquisitionError::Extract {
        path: archive.to_path_buf(),
        source,
    };
    let file = gazetteer_fs::open_utf8_file(archive).map_err(|source| AcquisitionError::Io {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut zip = ZipArchive::new(file).map_err(zip_error)?;
    gazetteer_fs::ensure_dir_all(destination).map_err(|source| AcquisitionError::Io {
        path: destination.to_path_buf(),
        source,
    })?;

    let mut written = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(zip_error)?;
        let Some(relative) = entry
            .enclosed_name()
            .and_then(|name| Utf8PathBuf::from_path_buf(name).ok())
        else {
            log::warn!("skipping unsafe archive entry {:?} in {archive}", entry.name());
            continue;
        };
        let target = destination.join(relative);
        let io_error = |source| AcquisitionError::Io {
            path: target.clone(),
            source,
        };
        if entry.is_dir() {
            gazetteer_fs::ensure_dir_all(&target).map_err(io_error)?;
            continue;
        }
        let mut output = gazetteer_fs::create_utf8_file(&target).map_err(io_error)?;
        io::copy(&mut entry, &mut output).map_err(io_error)?;
        written += 1;
    }
    log::info!("extracted {written} files from {archive} into {destination}");
    Ok(written)
}
