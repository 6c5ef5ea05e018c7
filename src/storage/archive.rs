/// Path-set archiving and restoration
///
/// Packs an ordered set of filesystem paths into a tar+zstd blob and unpacks it
/// back onto the same paths. Path `i` is stored under the tar root `i`, so
/// absolute locations such as `~/.dotnet/tools` round-trip on any platform.
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, EntryType};
use tracing::{debug, warn};
use zstd::{decode_all, encode_all};

use super::StoreError;

/// zstd compression level
const COMPRESSION_LEVEL: i32 = 3;

/// Summary of a packed path set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub paths_archived: usize,
    pub file_count: usize,
    pub size_bytes: u64,
}

/// Archive the given paths into compressed bytes
///
/// Missing paths are skipped. Fails when none of them exist.
pub fn pack(paths: &[PathBuf]) -> Result<(Vec<u8>, ArchiveSummary), StoreError> {
    let mut tar_data = Vec::new();
    let mut tar = Builder::new(&mut tar_data);
    let mut summary = ArchiveSummary::default();

    for (index, path) in paths.iter().enumerate() {
        let root = index.to_string();

        if !path.exists() {
            warn!(path = %path.display(), "Cache path does not exist, skipping");
            continue;
        }

        if path.is_dir() {
            tar.append_dir_all(&root, path)?;
            let (size, count) = dir_size_and_count(path)?;
            summary.size_bytes += size;
            summary.file_count += count;
        } else {
            let mut file = File::open(path)?;
            summary.size_bytes += file.metadata()?.len();
            summary.file_count += 1;
            tar.append_file(&root, &mut file)?;
        }

        summary.paths_archived += 1;
    }

    if summary.paths_archived == 0 {
        return Err(StoreError::Archive(
            "none of the cache paths exist, nothing to save".to_string(),
        ));
    }

    tar.finish()?;
    drop(tar);

    let compressed = encode_all(tar_data.as_slice(), COMPRESSION_LEVEL)?;

    debug!(
        paths = summary.paths_archived,
        files = summary.file_count,
        size_bytes = summary.size_bytes,
        compressed_bytes = compressed.len(),
        "Packed cache archive"
    );

    Ok((compressed, summary))
}

/// Unpack compressed bytes produced by [`pack`] onto `paths`
pub fn unpack(data: &[u8], paths: &[PathBuf]) -> Result<(), StoreError> {
    let tar_data = decode_all(data)?;
    unpack_reader(tar_data.as_slice(), paths)
}

/// Unpack an archive file produced by [`pack`] onto `paths`
pub fn unpack_file(archive_path: &Path, paths: &[PathBuf]) -> Result<(), StoreError> {
    let compressed = fs::read(archive_path)?;
    unpack(&compressed, paths)
}

fn unpack_reader<R: Read>(reader: R, paths: &[PathBuf]) -> Result<(), StoreError> {
    let mut archive = Archive::new(reader);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();
        let (index, relative) = split_entry_path(&entry_path)?;

        let base = paths.get(index).ok_or_else(|| {
            StoreError::Archive(format!(
                "archive entry '{}' refers to path #{} but only {} paths were given",
                entry_path.display(),
                index,
                paths.len()
            ))
        })?;

        let dest = if relative.as_os_str().is_empty() {
            base.clone()
        } else {
            base.join(&relative)
        };

        if entry.header().entry_type() == EntryType::Directory {
            fs::create_dir_all(&dest)?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest)?;
    }

    Ok(())
}

/// Split `3/sub/file` into `(3, "sub/file")`, rejecting anything but plain components
fn split_entry_path(entry_path: &Path) -> Result<(usize, PathBuf), StoreError> {
    let mut components = entry_path.components();

    let index = match components.next() {
        Some(Component::Normal(root)) => root.to_str().and_then(|s| s.parse::<usize>().ok()),
        _ => None,
    }
    .ok_or_else(|| {
        StoreError::Archive(format!("unexpected archive entry: {}", entry_path.display()))
    })?;

    let mut relative = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => {
                return Err(StoreError::Archive(format!(
                    "unsafe archive entry: {}",
                    entry_path.display()
                )))
            }
        }
    }

    Ok((index, relative))
}

/// Get total size and file count of a directory
fn dir_size_and_count(path: &Path) -> Result<(u64, usize), StoreError> {
    let mut total_size = 0;
    let mut file_count = 0;

    for entry in walkdir::WalkDir::new(path) {
        let entry = entry.map_err(|e| StoreError::Archive(e.to_string()))?;
        if entry.file_type().is_file() {
            total_size += entry
                .metadata()
                .map_err(|e| StoreError::Archive(e.to_string()))?
                .len();
            file_count += 1;
        }
    }

    Ok((total_size, file_count))
}
