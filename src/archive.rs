//! Zip archive building for job results and album downloads.

use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk {0:?}: {1}")]
    Walk(PathBuf, walkdir::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Entry name inside the archive, always `/`-separated.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_entries<W: Write + Seek>(
    writer: W,
    entries: &[(String, PathBuf)],
) -> Result<W, ArchiveError> {
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);

    for (name, path) in entries {
        debug!("Adding to zip: {:?} as {}", path, name);
        let mut file = File::open(path).map_err(io_err(path))?;
        zip.start_file(name.as_str(), options)?;
        std::io::copy(&mut file, &mut zip).map_err(io_err(path))?;
    }

    Ok(zip.finish()?)
}

/// Every regular file under `dir`, named by its path relative to `dir`,
/// sorted by name.
fn collect_dir_entries(dir: &Path) -> Result<Vec<(String, PathBuf)>, ArchiveError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| ArchiveError::Walk(dir.to_path_buf(), e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        entries.push((entry_name(relative), entry.path().to_path_buf()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Zip every file under `src_dir` into `dest`, returning the number of files
/// archived.
///
/// The archive is written next to `dest` first and renamed into place, so
/// `dest` never holds a partial archive.
pub fn zip_directory(src_dir: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let entries = collect_dir_entries(src_dir)?;

    let partial = dest.with_extension("zip.part");
    let file = File::create(&partial).map_err(io_err(&partial))?;
    let result = write_entries(file, &entries).and_then(|file| {
        file.sync_all().map_err(io_err(&partial))?;
        std::fs::rename(&partial, dest).map_err(io_err(dest))
    });
    if let Err(e) = result {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }

    Ok(entries.len())
}

/// Build an in-memory zip from `(entry name, file path)` pairs.
pub fn zip_files(entries: &[(String, PathBuf)]) -> Result<Vec<u8>, ArchiveError> {
    let cursor = write_entries(Cursor::new(Vec::new()), entries)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn names_in<R: Read + Seek>(reader: R) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(reader).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn zips_directory_with_relative_paths() {
        let src = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("Album")).unwrap();
        std::fs::write(src.path().join("Album/01 - a.m4a"), b"aaaa").unwrap();
        std::fs::write(src.path().join("single.m4a"), b"bb").unwrap();
        std::fs::write(src.path().join("archive.txt"), b"x\tlink\n").unwrap();

        let out = TempDir::new().unwrap();
        let dest = out.path().join("music_job.zip");
        let count = zip_directory(src.path(), &dest).unwrap();

        assert_eq!(count, 3);
        assert!(!out.path().join("music_job.zip.part").exists());
        assert_eq!(
            names_in(File::open(&dest).unwrap()),
            vec!["Album/01 - a.m4a", "archive.txt", "single.m4a"]
        );

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name("Album/01 - a.m4a")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "aaaa");
    }

    #[test]
    fn empty_directory_gives_empty_archive() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("empty.zip");

        assert_eq!(zip_directory(src.path(), &dest).unwrap(), 0);
        assert!(names_in(File::open(&dest).unwrap()).is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let out = TempDir::new().unwrap();
        let result = zip_directory(Path::new("/nonexistent/dir"), &out.path().join("x.zip"));
        assert!(matches!(result, Err(ArchiveError::Walk(..))));
        assert!(!out.path().join("x.zip").exists());
    }

    #[test]
    fn zips_file_list_in_memory() {
        let src = TempDir::new().unwrap();
        let a = src.path().join("a.m4a");
        std::fs::write(&a, b"a").unwrap();

        let bytes = zip_files(&[("Album/a.m4a".to_string(), a)]).unwrap();

        assert_eq!(names_in(Cursor::new(bytes)), vec!["Album/a.m4a"]);
    }

    #[test]
    fn missing_listed_file_is_an_error() {
        let result = zip_files(&[("x".to_string(), PathBuf::from("/nonexistent/x.m4a"))]);
        assert!(matches!(result, Err(ArchiveError::Io { .. })));
    }
}
