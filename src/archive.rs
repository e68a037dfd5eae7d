use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Result;

/// Extract every entry of a zip archive below `dest`.
///
/// Returns the paths of the extracted files. Entries whose names would escape
/// `dest` are skipped.
pub fn extract(zip_path: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    debug!(?zip_path, ?dest, "extracting archive");
    fs::create_dir_all(dest)?;

    let mut archive = zip::ZipArchive::new(File::open(zip_path)?)?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(rel) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!(name = entry.name(), "skipping archive entry with unsafe path");
            continue;
        };
        let out_path = dest.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        extracted.push(out_path);
    }

    info!(files = extracted.len(), ?zip_path, "archive extracted");
    Ok(extracted)
}

/// Outcome of [`cleanup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub files_moved: usize,
    pub dirs_removed: usize,
    /// Files renamed because `root` already had one with the same name.
    pub renamed: usize,
}

/// Flatten `root`: move every file found in its subdirectories up into `root`
/// and remove the emptied subdirectories.
///
/// Orders unpack one directory per granule; this leaves just the files.
pub fn cleanup(root: &Path) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            flatten_into(root, &entry.path(), &mut report)?;
        }
    }
    info!(
        ?root,
        moved = report.files_moved,
        removed = report.dirs_removed,
        "output directory flattened"
    );
    Ok(report)
}

fn flatten_into(root: &Path, dir: &Path, report: &mut CleanupReport) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            flatten_into(root, &path, report)?;
            continue;
        }
        let target = free_name(root, &entry.file_name());
        if target.file_name() != Some(entry.file_name().as_os_str()) {
            report.renamed += 1;
        }
        fs::rename(&path, &target)?;
        report.files_moved += 1;
    }
    fs::remove_dir(dir)?;
    report.dirs_removed += 1;
    Ok(())
}

/// `root/name`, or `root/stem_N.ext` for the first N that is not taken.
fn free_name(root: &Path, name: &std::ffi::OsStr) -> PathBuf {
    let candidate = root.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = as_path.extension().map(|e| e.to_string_lossy().into_owned());
    let mut n = 1;
    loop {
        let file = match &ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        let candidate = root.join(file);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Extract every `*.zip` directly inside `dir` into `dir`, deleting each archive
/// once it is unpacked.
pub fn extract_all(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut zips: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p
                    .extension()
                    .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("zip"))
        })
        .collect();
    zips.sort();

    let mut files = Vec::new();
    for z in zips {
        files.extend(extract(&z, dir)?);
        fs::remove_file(&z)?;
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut w = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            if name.ends_with('/') {
                w.add_directory(*name, zip::write::FileOptions::default()).unwrap();
            } else {
                w.start_file(*name, zip::write::FileOptions::default()).unwrap();
                w.write_all(data.as_bytes()).unwrap();
            }
        }
        w.finish().unwrap();
    }

    fn count_files(dir: &Path) -> usize {
        let mut n = 0;
        for e in fs::read_dir(dir).unwrap() {
            let e = e.unwrap();
            if e.file_type().unwrap().is_dir() {
                n += count_files(&e.path());
            } else {
                n += 1;
            }
        }
        n
    }

    #[test]
    fn extracts_nested_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("order.zip");
        write_zip(
            &zip_path,
            &[
                ("5000000962482/", ""),
                ("5000000962482/processed_ATL07-01_20190323.h5", "granule-a"),
                ("5000000962482/processed_ATL07-01_20190323.iso.xml", "<meta/>"),
            ],
        );
        let out = tmp.path().join("out");
        let files = extract(&zip_path, &out).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(
            fs::read(out.join("5000000962482/processed_ATL07-01_20190323.h5")).unwrap(),
            b"granule-a"
        );
    }

    #[test]
    fn unsafe_entries_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("evil.zip");
        write_zip(&zip_path, &[("../escape.txt", "x"), ("ok.txt", "y")]);
        let out = tmp.path().join("out");
        let files = extract(&zip_path, &out).unwrap();
        assert_eq!(files, vec![out.join("ok.txt")]);
        assert!(!tmp.path().join("escape.txt").exists());
    }

    #[test]
    fn cleanup_flattens_and_keeps_every_file() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/deeper")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("top.h5"), "0").unwrap();
        fs::write(root.join("a/one.h5"), "1").unwrap();
        fs::write(root.join("a/deeper/two.h5"), "2").unwrap();
        fs::write(root.join("b/one.h5"), "3").unwrap();

        let before = count_files(root);
        let report = cleanup(root).unwrap();

        assert_eq!(count_files(root), before);
        assert_eq!(report.files_moved, 3);
        assert_eq!(report.dirs_removed, 4);
        assert_eq!(report.renamed, 1);
        for e in fs::read_dir(root).unwrap() {
            assert!(e.unwrap().file_type().unwrap().is_file());
        }
        assert!(root.join("one.h5").exists());
        assert!(root.join("one_1.h5").exists());
        assert!(root.join("two.h5").exists());
    }

    #[test]
    fn extract_all_unpacks_and_removes_zips() {
        let tmp = tempfile::tempdir().unwrap();
        write_zip(&tmp.path().join("p1.zip"), &[("g1/a.h5", "a")]);
        write_zip(&tmp.path().join("p2.ZIP"), &[("g2/b.h5", "b")]);
        let files = extract_all(tmp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(!tmp.path().join("p1.zip").exists());
        assert!(tmp.path().join("g2/b.h5").exists());
    }
}
