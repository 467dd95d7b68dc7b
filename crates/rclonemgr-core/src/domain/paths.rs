//! Path translation between the local mount tree and rclone remotes
//!
//! Every drive is mounted at `<mount root>/<drive>`, and rclone addresses the
//! same location as `<drive>:<subpath>`. The functions here convert between
//! the two forms and check that a local path really lives under the mount
//! root. Nothing here touches the filesystem: paths are made absolute against
//! the current directory and normalized lexically.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A location inside a logical drive, independent of where it is mounted
///
/// Renders as `remote:subpath`, the syntax rclone expects on its command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemotePath {
    remote: String,
    subpath: String,
}

impl RemotePath {
    /// Creates a remote path, rejecting components that start with `..`
    pub fn new(remote: impl Into<String>, subpath: impl Into<String>) -> Result<Self, DomainError> {
        let remote = remote.into();
        let subpath = subpath.into();
        if remote.is_empty() || remote.starts_with("..") || subpath.starts_with("..") {
            return Err(DomainError::InvalidPath(format!("{remote}:{subpath}")));
        }
        Ok(Self { remote, subpath })
    }

    /// The top-level drive identifier
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// The path within the drive (empty for the drive root)
    pub fn subpath(&self) -> &str {
        &self.subpath
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.remote, self.subpath)
    }
}

/// Makes `path` absolute against the current directory and normalizes it
///
/// `.` components are dropped and `..` pops the previous component, the same
/// way a shell would resolve the path textually. Symlinks are not followed.
pub fn absolutize(path: &Path) -> Result<PathBuf, DomainError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|e| DomainError::Unresolvable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        cwd.join(path)
    };
    Ok(normalize(&joined))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Returns true if `candidate` is `root` itself or lies somewhere below it
///
/// The comparison is component-wise, so `/mnt/google-old` is not considered
/// to be inside `/mnt/google`.
pub fn is_subdirectory(root: &Path, candidate: &Path) -> Result<bool, DomainError> {
    let root = absolutize(root)?;
    let candidate = absolutize(candidate)?;
    Ok(candidate.starts_with(&root))
}

/// Converts an absolute local path under `root` into its remote coordinate
///
/// The first component below `root` names the drive, the rest becomes the
/// subpath:
///
/// ```
/// use std::path::Path;
/// use rclonemgr_core::domain::paths::to_remote_coordinate;
///
/// let remote = to_remote_coordinate(Path::new("/home/me/google"), Path::new("/home/me/google/team/a/b.txt")).unwrap();
/// assert_eq!(remote.to_string(), "team:a/b.txt");
/// ```
pub fn to_remote_coordinate(root: &Path, absolute: &Path) -> Result<RemotePath, DomainError> {
    let root = absolutize(root)?;
    let absolute = absolutize(absolute)?;

    let relative = absolute
        .strip_prefix(&root)
        .map_err(|_| DomainError::InvalidPath(absolute.display().to_string()))?;

    let mut segments = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned());

    let remote = segments
        .next()
        .ok_or_else(|| DomainError::InvalidPath(absolute.display().to_string()))?;
    let subpath = segments.collect::<Vec<_>>().join("/");

    RemotePath::new(remote, subpath)
        .map_err(|_| DomainError::InvalidPath(absolute.display().to_string()))
}

/// Extends a destination coordinate with the base name of a directory source
///
/// rclone copies the *contents* of a directory into the destination, so
/// without this `a:photos` -> `b:backup` would spill the photos straight into
/// `backup` instead of creating `backup/photos`.
pub fn patch_destination_for_directory_source(source_subpath: &str, destination: &str) -> String {
    let mut dest = destination.to_string();
    if !dest.ends_with('/') {
        dest.push('/');
    }

    match source_subpath.rsplit('/').find(|s| !s.is_empty()) {
        Some(base) => format!("{dest}{base}"),
        None => dest.trim_end_matches('/').to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_subdirectory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(root.join("subdir")).unwrap();
        std::fs::create_dir_all(tmp.path().join("other")).unwrap();

        let cases = [
            ("self", root.clone(), root.clone(), true),
            ("direct subdir", root.clone(), root.join("subdir"), true),
            ("not subdir", root.clone(), tmp.path().join("other"), false),
            ("parent", root.join("subdir"), root.clone(), false),
            ("parent of root", root.clone(), tmp.path().to_path_buf(), false),
            ("shared name prefix", root.clone(), tmp.path().join("rootfoo"), false),
        ];

        for (name, root, candidate, want) in cases {
            let got = is_subdirectory(&root, &candidate).unwrap();
            assert_eq!(got, want, "{name}: is_subdirectory({root:?}, {candidate:?})");
        }
    }

    #[test]
    fn test_is_subdirectory_resolves_dot_dot() {
        let root = Path::new("/home/user/google");
        assert!(!is_subdirectory(root, Path::new("/home/user/google/../secrets")).unwrap());
        assert!(is_subdirectory(root, Path::new("/home/user/google/a/../b")).unwrap());
    }

    #[test]
    fn test_to_remote_coordinate() {
        let root = Path::new("/home/user/google");

        let r = to_remote_coordinate(root, Path::new("/home/user/google/drive1/file.txt")).unwrap();
        assert_eq!(r.remote(), "drive1");
        assert_eq!(r.subpath(), "file.txt");

        let r = to_remote_coordinate(root, Path::new("/home/user/google/drive1/folder/file.txt"))
            .unwrap();
        assert_eq!(r.remote(), "drive1");
        assert_eq!(r.subpath(), "folder/file.txt");
        assert_eq!(r.to_string(), "drive1:folder/file.txt");

        let r = to_remote_coordinate(root, Path::new("/home/user/google/drive1")).unwrap();
        assert_eq!(r.remote(), "drive1");
        assert_eq!(r.subpath(), "");
        assert_eq!(r.to_string(), "drive1:");
    }

    #[test]
    fn test_to_remote_coordinate_rejects_outside_root() {
        let root = Path::new("/home/user/google");
        let err = to_remote_coordinate(root, Path::new("/home/user")).unwrap_err();
        assert!(matches!(err, DomainError::InvalidPath(_)));

        let err = to_remote_coordinate(root, Path::new("/home/user/google-old/x")).unwrap_err();
        assert!(matches!(err, DomainError::InvalidPath(_)));
    }

    #[test]
    fn test_to_remote_coordinate_rejects_root_itself() {
        let root = Path::new("/home/user/google");
        assert!(to_remote_coordinate(root, root).is_err());
    }

    #[test]
    fn test_remote_path_rejects_parent_markers() {
        assert!(RemotePath::new("..", "x").is_err());
        assert!(RemotePath::new("drive", "../x").is_err());
        assert!(RemotePath::new("", "x").is_err());
        assert!(RemotePath::new("drive", "x/..y").is_ok());
    }

    #[test]
    fn test_patch_destination() {
        let cases = [
            ("/foo/bar.txt", "/dest/", "/dest/bar.txt"),
            ("/foo/bar.txt", "/dest", "/dest/bar.txt"),
            ("/foo/dir", "/dest", "/dest/dir"),
            ("/foo/file.txt", "/", "/file.txt"),
            ("folder", "dest:path/", "dest:path/folder"),
            ("a/b/folder", "dest:", "dest:/folder"),
        ];
        for (src, dest, want) in cases {
            assert_eq!(
                patch_destination_for_directory_source(src, dest),
                want,
                "patch({src:?}, {dest:?})"
            );
        }
    }

    #[test]
    fn test_patch_destination_without_base_name() {
        assert_eq!(patch_destination_for_directory_source("", "dest:path/"), "dest:path");
    }
}
