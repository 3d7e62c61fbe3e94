//! Filesystem helpers shared by both volume strategies.
//!
//! These are blocking; callers run them on `spawn_blocking`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Where the content of `source` lands under `base`.
///
/// A non-empty `remainder` is used as the relative target path. Otherwise a
/// directory fills `base` itself and a single file keeps its own name.
pub fn copy_target(base: &Path, remainder: &str, source: &Path) -> PathBuf {
    if !remainder.is_empty() {
        base.join(remainder)
    } else if source.is_dir() {
        base.to_path_buf()
    } else {
        base.join(source.file_name().unwrap_or_default())
    }
}

/// Copy `src` to `dst`.
///
/// A directory is copied recursively so that `dst` ends up with the same
/// content as `src`; a single file is copied to exactly `dst`. Symlinks are
/// recreated, not followed.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(src)?;
    if metadata.is_dir() {
        copy_dir_recursive(src, dst)
    } else {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        copy_entry(src, dst, &metadata)
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let metadata = fs::symlink_metadata(&path)?;

        if metadata.is_dir() {
            copy_dir_recursive(&path, &dst_path)?;
        } else {
            copy_entry(&path, &dst_path, &metadata)?;
        }
    }

    Ok(())
}

fn copy_entry(src: &Path, dst: &Path, metadata: &fs::Metadata) -> io::Result<()> {
    if metadata.file_type().is_symlink() {
        let target = fs::read_link(src)?;
        if fs::symlink_metadata(dst).is_ok() {
            fs::remove_file(dst)?;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, dst)?;
        #[cfg(not(unix))]
        fs::copy(src, dst)?;
        Ok(())
    } else {
        fs::copy(src, dst).map(|_| ())
    }
}

/// Make everything under `root` world readable and writable, so the
/// container user can use the content whatever its uid.
#[cfg(unix)]
pub fn normalize_permissions(root: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::symlink_metadata(root)?;
    if metadata.file_type().is_symlink() {
        return Ok(());
    }

    let mode = metadata.permissions().mode();
    if metadata.is_dir() {
        fs::set_permissions(root, fs::Permissions::from_mode(mode | 0o777))?;
        for entry in fs::read_dir(root)? {
            normalize_permissions(&entry?.path())?;
        }
    } else {
        // Keep execute bits as they were.
        fs::set_permissions(root, fs::Permissions::from_mode(mode | 0o666))?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn normalize_permissions(_root: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_target() {
        let src = TempDir::new().unwrap();
        let file = src.path().join("site.conf");
        std::fs::write(&file, "").unwrap();
        let base = Path::new("/mnt/vol");

        assert_eq!(copy_target(base, "app/static", src.path()), base.join("app/static"));
        assert_eq!(copy_target(base, "", src.path()), base.to_path_buf());
        assert_eq!(copy_target(base, "", &file), base.join("site.conf"));
    }

    #[test]
    fn test_copy_tree_directory() {
        let src = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("css")).unwrap();
        std::fs::write(src.path().join("index.html"), "<html/>").unwrap();
        std::fs::write(src.path().join("css/site.css"), "body{}").unwrap();

        let dst = TempDir::new().unwrap();
        let target = dst.path().join("nested/app");
        copy_tree(src.path(), &target).unwrap();

        assert_eq!(std::fs::read_to_string(target.join("index.html")).unwrap(), "<html/>");
        assert_eq!(std::fs::read_to_string(target.join("css/site.css")).unwrap(), "body{}");
    }

    #[test]
    fn test_copy_tree_single_file() {
        let src = TempDir::new().unwrap();
        let file = src.path().join("nginx.conf");
        std::fs::write(&file, "server {}").unwrap();

        let dst = TempDir::new().unwrap();
        let target = dst.path().join("etc/nginx/nginx.conf");
        copy_tree(&file, &target).unwrap();

        assert_eq!(std::fs::read_to_string(target).unwrap(), "server {}");
    }

    #[test]
    fn test_copy_tree_missing_source() {
        let dst = TempDir::new().unwrap();
        assert!(copy_tree(Path::new("/nonexistent/src"), dst.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_keeps_symlinks() {
        let src = TempDir::new().unwrap();
        std::fs::write(src.path().join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink("real.txt", src.path().join("link.txt")).unwrap();

        let dst = TempDir::new().unwrap();
        copy_tree(src.path(), dst.path()).unwrap();

        let link = std::fs::read_link(dst.path().join("link.txt")).unwrap();
        assert_eq!(link, Path::new("real.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let dir = root.path().join("data");
        std::fs::create_dir(&dir).unwrap();
        let file = dir.join("db.sqlite");
        std::fs::write(&file, "").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o600)).unwrap();
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700)).unwrap();

        normalize_permissions(root.path()).unwrap();

        let dir_mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        let file_mode = std::fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o777);
        assert_eq!(file_mode, 0o666);
    }
}
