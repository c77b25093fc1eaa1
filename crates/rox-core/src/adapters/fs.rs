//! Filesystem copy collaborator.
//!
//! Each attempt writes to its own uniquely named temp file next to `dst` and
//! renames it into place, so a failed attempt never leaves a truncated
//! destination and concurrent copies into one `dst` never share a temp file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Temp file name suffix used before the rename.
pub const PART_SUFFIX: &str = ".rox-part";

/// Fresh temp file in the directory of `dst`, so the final rename stays on
/// one filesystem. Removed on drop unless persisted.
fn sibling_temp(dst: &Path) -> io::Result<NamedTempFile> {
    let dir = match dst.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut prefix = std::ffi::OsString::from(".");
    if let Some(name) = dst.file_name() {
        prefix.push(name);
        prefix.push(".");
    }
    tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(PART_SUFFIX)
        .tempfile_in(dir)
}

fn persist(tmp: NamedTempFile, dst: &Path) -> io::Result<()> {
    tmp.persist(dst).map(|_| ()).map_err(|e| e.error)
}

/// Copy `src` to `dst` atomically with respect to readers of `dst`.
/// Returns the number of bytes copied.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut source = fs::File::open(src)?;
    let permissions = source.metadata()?.permissions();
    let mut tmp = sibling_temp(dst)?;
    let copied = io::copy(&mut source, &mut tmp)?;
    tmp.as_file().set_permissions(permissions)?;
    persist(tmp, dst)?;
    Ok(copied)
}

/// Write `data` to `dst` through the same temp-then-rename path as [`copy_file`].
pub fn write_file(dst: &Path, data: &[u8]) -> io::Result<()> {
    let mut tmp = sibling_temp(dst)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    persist(tmp, dst)
}

/// [`copy_file`] on the blocking pool.
pub async fn copy_file_async(src: PathBuf, dst: PathBuf) -> io::Result<u64> {
    tokio::task::spawn_blocking(move || copy_file(&src, &dst))
        .await
        .map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{Describe, FailureDescriptor, SystemCode};
    use std::sync::{Arc, Barrier};

    fn leftover_parts(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with(PART_SUFFIX))
            .collect()
    }

    #[test]
    fn copies_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        fs::write(&src, b"hello rox").unwrap();

        assert_eq!(copy_file(&src, &dst).unwrap(), 9);
        assert_eq!(fs::read(&dst).unwrap(), b"hello rox");
        assert!(leftover_parts(dir.path()).is_empty());
    }

    #[test]
    fn write_file_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("index.json");
        fs::write(&dst, b"old").unwrap();
        write_file(&dst, b"new contents").unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"new contents");
        assert!(leftover_parts(dir.path()).is_empty());
    }

    #[test]
    fn missing_source_describes_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_file(&dir.path().join("nope"), &dir.path().join("out")).unwrap_err();
        assert_eq!(err.describe(), FailureDescriptor::System(SystemCode::NotFound));
        assert!(leftover_parts(dir.path()).is_empty());
    }

    #[test]
    fn concurrent_copies_into_one_destination_all_succeed() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 5;
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("out.bin");
        let sources: Vec<(PathBuf, Vec<u8>)> = (0..THREADS)
            .map(|i| {
                let path = dir.path().join(format!("src-{i}.bin"));
                let body = vec![i as u8; 256 * 1024];
                fs::write(&path, &body).unwrap();
                (path, body)
            })
            .collect();

        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = sources
            .iter()
            .cloned()
            .map(|(src, _)| {
                let dst = dst.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    (0..ROUNDS)
                        .map(|_| copy_file(&src, &dst).map(|_| ()))
                        .collect::<io::Result<Vec<_>>>()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }

        // Whole content of exactly one source, never a mix.
        let out = fs::read(&dst).unwrap();
        assert!(sources.iter().any(|(_, body)| *body == out));
        assert!(leftover_parts(dir.path()).is_empty());
    }
}
