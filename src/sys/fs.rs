use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{trace, warn};

const MAX_STEM_CHARS: usize = 60;

/// Lexically normalizes a path: drops `.` components, folds `..` into the
/// parent and removes trailing separators. Never touches the file system, so
/// it also works for files that were already deleted.
pub fn standardize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Turns arbitrary text into something usable as a file name stem.
pub fn sanitize_file_stem(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '/' | ':' | '\\' | '\0' => '-',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c == '-' || c.is_whitespace());
    let stem: String = trimmed.chars().take(MAX_STEM_CHARS).collect();
    let stem = stem.trim_end().to_string();
    if stem.is_empty() { fallback.to_string() } else { stem }
}

/// `dir/stem.ext`, or `dir/stem 2.ext`, `dir/stem 3.ext`, ... if taken.
pub fn unique_child_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}.{ext}"));
    if !candidate.exists() {
        return candidate;
    }
    (2u32..)
        .map(|n| dir.join(format!("{stem} {n}.{ext}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// A random (version 4) UUID in its canonical hyphenated form.
pub fn random_uuid() -> String {
    let mut bytes: [u8; 16] = rand::random();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Creates `<temp_root>/<prefix>-<UUID>`; one per drop so rapid successive
/// drops never collide.
pub fn create_drop_dir(temp_root: &Path, prefix: &str) -> io::Result<PathBuf> {
    let dir = temp_root.join(format!("{prefix}-{}", random_uuid()));
    std::fs::create_dir_all(&dir)?;
    trace!(?dir, "Created drop directory");
    Ok(dir)
}

/// Removes a file or directory tree, treating "already gone" as success.
pub fn remove_quietly(path: &Path) -> bool {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return false,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(?path, "Failed to remove temporary path: {e}");
            false
        }
    }
}

/// Removes every entry of `dir` except the paths in `keep`. With nothing to
/// keep, `dir` itself goes too.
pub fn remove_all_except(dir: &Path, keep: &[PathBuf]) -> usize {
    if keep.is_empty() {
        return usize::from(remove_quietly(dir));
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(?dir, "Failed to list drop directory: {e}");
            }
            return 0;
        }
    };
    let keep: Vec<_> = keep.iter().map(|path| standardize_path(path)).collect();
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| !keep.contains(&standardize_path(path)))
        .filter(|path| remove_quietly(path))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardize_folds_dot_segments_and_trailing_slash() {
        assert_eq!(
            standardize_path(Path::new("/Users/me/./Desktop/../Downloads/file.txt")),
            PathBuf::from("/Users/me/Downloads/file.txt")
        );
        assert_eq!(
            standardize_path(Path::new("/tmp/folder/")),
            PathBuf::from("/tmp/folder")
        );
    }

    #[test]
    fn sanitize_replaces_separators_and_falls_back() {
        assert_eq!(sanitize_file_stem("Re: a/b", "Message"), "Re- a-b");
        assert_eq!(sanitize_file_stem("  \n ", "Message"), "Message");
        assert_eq!(sanitize_file_stem("...", "Text"), "Text");
    }

    #[test]
    fn sanitize_truncates_long_text() {
        let long = "word ".repeat(40);
        assert!(sanitize_file_stem(&long, "Text").chars().count() <= MAX_STEM_CHARS);
    }

    #[test]
    fn uuid_has_canonical_shape() {
        let id = random_uuid();
        let groups: Vec<_> = id.split('-').map(str::len).collect();
        assert_eq!(groups, vec![8, 4, 4, 4, 12]);
        assert_eq!(&id[14..15], "4");
        assert_ne!(random_uuid(), id);
    }

    #[test]
    fn unique_child_path_appends_counter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = unique_child_path(dir.path(), "Link", "webloc");
        std::fs::write(&first, b"x").expect("write");
        let second = unique_child_path(dir.path(), "Link", "webloc");
        assert_eq!(second, dir.path().join("Link 2.webloc"));
    }

    #[test]
    fn drop_dirs_are_distinct_and_prefixed() {
        let root = tempfile::tempdir().expect("tempdir");
        let a = create_drop_dir(root.path(), "droppy").expect("create a");
        let b = create_drop_dir(root.path(), "droppy").expect("create b");
        assert_ne!(a, b);
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("droppy-"));
        assert!(remove_quietly(&a));
        assert!(!a.exists());
        assert!(!remove_quietly(&a));
    }

    #[test]
    fn remove_all_except_spares_kept_entries() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = create_drop_dir(root.path(), "droppy").expect("create");
        let kept = dir.join("kept.jpg");
        let stray = dir.join("stray.jpg");
        std::fs::write(&kept, b"x").expect("write kept");
        std::fs::write(&stray, b"x").expect("write stray");

        assert_eq!(remove_all_except(&dir, &[kept.clone()]), 1);
        assert!(kept.exists());
        assert!(!stray.exists());

        assert_eq!(remove_all_except(&dir, &[]), 1);
        assert!(!dir.exists());
    }
}
