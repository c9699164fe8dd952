//! Filesystem helpers for download caches and configuration files, built on
//! `cap-std` and `camino`.
//!
//! Callers pass ordinary UTF-8 paths. Each helper splits the path into an
//! ambient base directory (the filesystem root, a Windows drive prefix or the
//! current directory) and a relative suffix, then performs the operation
//! through the capability handle for that base.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs::Metadata;
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;
use std::time::SystemTime;

/// Open a UTF-8 file path for reading using ambient authority.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Create (or truncate) a file, creating missing parent directories first.
pub fn create_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    ensure_parent_dir(path)?;
    let (dir, name) = open_dir_and_file(path)?;
    dir.create(name)
}

/// Resolve an ambient directory for the given path and return the directory
/// with the file name.
fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} does not name a file")))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Ensure the parent directory for `path` exists.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => ensure_dir_all(parent),
        _ => Ok(()),
    }
}

/// Create `path` and any missing ancestors.
pub fn ensure_dir_all(path: &Utf8Path) -> io::Result<()> {
    let (base, relative) = base_dir_and_relative(path)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

/// Remove a directory tree. Returns `false` when nothing existed.
///
/// # Errors
/// Fails when `path` exists but is not a directory, or on any I/O error.
pub fn remove_dir_all(path: &Utf8Path) -> io::Result<bool> {
    match metadata(path)? {
        None => Ok(false),
        Some(meta) if meta.is_dir() => {
            let (base, relative) = base_dir_and_relative(path)?;
            if relative.as_str().is_empty() {
                return Err(io::Error::other(format!("refusing to remove {path}")));
            }
            base.remove_dir_all(&relative)?;
            Ok(true)
        }
        Some(_) => Err(io::Error::other(format!("{path} is not a directory"))),
    }
}

/// Remove a single file if it exists.
pub fn remove_file(path: &Utf8Path) -> io::Result<()> {
    let (dir, name) = open_dir_and_file(path)?;
    match dir.remove_file(name) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Metadata for `path`, or `None` when it does not exist.
pub fn metadata(path: &Utf8Path) -> io::Result<Option<Metadata>> {
    let (base, relative) = base_dir_and_relative(path)?;
    let relative = if relative.as_str().is_empty() {
        Utf8PathBuf::from(".")
    } else {
        relative
    };
    match base.metadata(&relative) {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Return whether a path exists and is a regular file.
pub fn is_file(path: &Utf8Path) -> io::Result<bool> {
    Ok(metadata(path)?.is_some_and(|meta| meta.is_file()))
}

/// Return whether a path exists and is a directory.
pub fn is_dir(path: &Utf8Path) -> io::Result<bool> {
    Ok(metadata(path)?.is_some_and(|meta| meta.is_dir()))
}

/// Size in bytes of a regular file, or `None` when no file exists.
pub fn file_size(path: &Utf8Path) -> io::Result<Option<u64>> {
    Ok(metadata(path)?
        .filter(Metadata::is_file)
        .map(|meta| meta.len()))
}

/// Last modification time, or `None` when the path does not exist.
pub fn modified(path: &Utf8Path) -> io::Result<Option<SystemTime>> {
    metadata(path)?
        .map(|meta| meta.modified().map(cap_std::time::SystemTime::into_std))
        .transpose()
}

/// Search `root` recursively for a regular file called `name`.
///
/// Entries are visited in name order, files of a directory before its
/// subdirectories, so the first match is stable across runs.
pub fn find_file_named(root: &Utf8Path, name: &str) -> io::Result<Option<Utf8PathBuf>> {
    let (base, relative) = base_dir_and_relative(root)?;
    let dir = if relative.as_str().is_empty() {
        base
    } else {
        base.open_dir(&relative)?
    };
    find_in(&dir, root, name)
}

fn find_in(dir: &fs_utf8::Dir, prefix: &Utf8Path, name: &str) -> io::Result<Option<Utf8PathBuf>> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in dir.entries()? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let entry_name = entry.file_name()?;
        if file_type.is_dir() {
            subdirs.push(entry_name);
        } else if file_type.is_file() {
            files.push(entry_name);
        }
    }
    if files.iter().any(|file| file == name) {
        return Ok(Some(prefix.join(name)));
    }
    subdirs.sort();
    for subdir in subdirs {
        let child = dir.open_dir(&subdir)?;
        if let Some(found) = find_in(&child, &prefix.join(&subdir), name)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Split an absolute or relative path into an ambient base directory and a
/// relative suffix.
fn base_dir_and_relative(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();

    let (base, relative) = match std_path.components().next() {
        // Windows drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_path.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from path"))?
                .to_path_buf();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), std_path.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative =
        Utf8PathBuf::from_path_buf(relative).map_err(|_| io::Error::other("non-UTF-8 path"))?;

    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::io::Write;
    use tempfile::TempDir;

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temp path is UTF-8")
    }

    fn write(path: &Utf8Path, contents: &[u8]) {
        let mut file = create_utf8_file(path).expect("create file");
        file.write_all(contents).expect("write file");
    }

    #[rstest]
    fn creates_nested_file_and_reports_size(temp_dir: TempDir) {
        let path = utf8(&temp_dir).join("a/b/data.txt");
        write(&path, b"hello");
        assert!(is_file(&path).expect("probe file"));
        assert!(is_dir(&utf8(&temp_dir).join("a/b")).expect("probe dir"));
        assert_eq!(file_size(&path).expect("size"), Some(5));
        assert!(modified(&path).expect("mtime").is_some());
    }

    #[rstest]
    fn missing_paths_report_none(temp_dir: TempDir) {
        let path = utf8(&temp_dir).join("absent.txt");
        assert_eq!(file_size(&path).expect("size"), None);
        assert_eq!(modified(&path).expect("mtime"), None);
        assert!(!is_file(&path).expect("probe"));
    }

    #[rstest]
    fn directories_have_no_file_size(temp_dir: TempDir) {
        assert_eq!(file_size(&utf8(&temp_dir)).expect("size"), None);
    }

    #[rstest]
    fn removes_directory_trees(temp_dir: TempDir) {
        let root = utf8(&temp_dir).join("downloads");
        write(&root.join("nested/file.bin"), b"x");
        assert!(remove_dir_all(&root).expect("remove tree"));
        assert!(!is_dir(&root).expect("probe"));
        assert!(!remove_dir_all(&root).expect("second removal is a no-op"));
    }

    #[rstest]
    fn refuses_to_remove_a_file_as_directory(temp_dir: TempDir) {
        let path = utf8(&temp_dir).join("plain.txt");
        write(&path, b"x");
        assert!(remove_dir_all(&path).is_err());
        remove_file(&path).expect("remove file");
        remove_file(&path).expect("removing a missing file is a no-op");
    }

    #[rstest]
    fn finds_nested_files_in_name_order(temp_dir: TempDir) {
        let root = utf8(&temp_dir);
        write(&root.join("b/target.txt"), b"b");
        write(&root.join("a/deep/target.txt"), b"a");
        write(&root.join("a/other.txt"), b"o");
        let found = find_file_named(&root, "target.txt").expect("search");
        assert_eq!(found, Some(root.join("a/deep/target.txt")));
        assert_eq!(find_file_named(&root, "missing.txt").expect("search"), None);
    }

    #[rstest]
    fn prefers_shallow_matches(temp_dir: TempDir) {
        let root = utf8(&temp_dir);
        write(&root.join("a/target.txt"), b"deep");
        write(&root.join("target.txt"), b"shallow");
        let found = find_file_named(&root, "target.txt").expect("search");
        assert_eq!(found, Some(root.join("target.txt")));
    }
}
