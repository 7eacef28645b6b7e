//! Mountpoints: URL prefixes bound to filesystem directories.
//!
//! A mountpoint is created once at startup from a user-supplied directory,
//! which is canonicalised up front. All request-path translation funnels
//! through [`Mountpoint::resolve_strict`] and [`Mountpoint::resolve_parent`];
//! both refuse any path whose canonical form leaves the docroot.

use std::io;
use std::path::{Path, PathBuf};

use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::DavResult;

/// A URL prefix mapped onto a canonical docroot directory.
#[derive(Debug, Clone)]
pub struct Mountpoint {
    prefix: String,
    docroot: PathBuf,
}

impl Mountpoint {
    /// Bind `prefix` to `dir`. The directory must exist; it is
    /// canonicalised here and never re-checked.
    pub fn new(prefix: impl Into<String>, dir: impl AsRef<Path>) -> io::Result<Mountpoint> {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.starts_with('/') {
            prefix.insert(0, '/');
        }
        while prefix.ends_with('/') {
            prefix.pop();
        }
        let docroot = std::fs::canonicalize(dir.as_ref())?;
        if !docroot.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                "docroot is not a directory",
            ));
        }
        info!(
            "webdav mountpoint {:?} added: docroot={}",
            prefix,
            docroot.display()
        );
        Ok(Mountpoint { prefix, docroot })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn docroot(&self) -> &Path {
        &self.docroot
    }

    // canonicalise docroot + rel and verify containment.
    async fn resolve_rel(&self, rel: &str) -> DavResult<PathBuf> {
        let joined = self.docroot.join(rel.trim_start_matches('/'));
        let real = tokio::fs::canonicalize(&joined)
            .await
            .map_err(|_| DavError::NotFound)?;
        if real == self.docroot || real.starts_with(&self.docroot) {
            Ok(real)
        } else {
            debug!("resolve: {rel:?} escapes {:?}", self.docroot);
            Err(DavError::NotFound)
        }
    }

    /// Resolve an existing resource. The whole path is canonicalised
    /// (`.`, `..` and symlinks resolved), so a missing component or an
    /// escape from the docroot both come back as `NotFound`.
    pub async fn resolve_strict(&self, path: &DavPath) -> DavResult<PathBuf> {
        self.resolve_rel(path.rel()).await
    }

    /// Resolve a resource that need not exist, for creation methods.
    /// Everything up to the last `/` is resolved strictly, then the
    /// final component is appended literally. A missing or non-directory
    /// parent is a `Conflict`, as is a leaf of `.` or `..`.
    pub async fn resolve_parent(&self, path: &DavPath) -> DavResult<PathBuf> {
        let mut rel = path.rel();
        while rel.len() > 1 && rel.ends_with('/') {
            rel = &rel[..rel.len() - 1];
        }
        let idx = rel.rfind('/').ok_or(DavError::Conflict)?;
        let (parent, leaf) = (&rel[..idx], &rel[idx + 1..]);
        if leaf.is_empty() || leaf == "." || leaf == ".." {
            return Err(DavError::Conflict);
        }
        let parent = if parent.is_empty() { "/" } else { parent };
        let parent_abs = match self.resolve_rel(parent).await {
            Ok(p) => p,
            Err(_) => return Err(DavError::Conflict),
        };
        let meta = tokio::fs::metadata(&parent_abs)
            .await
            .map_err(|_| DavError::Conflict)?;
        if !meta.is_dir() {
            return Err(DavError::Conflict);
        }
        Ok(parent_abs.join(leaf))
    }
}

/// The immutable mountpoint table, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    mounts: Vec<Mountpoint>,
}

impl MountTable {
    pub fn new(mounts: Vec<Mountpoint>) -> MountTable {
        MountTable { mounts }
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Longest-prefix match of a decoded request path. Returns the mount
    /// and the remainder of the path (starting with '/', or empty when
    /// the request hit the prefix exactly).
    pub fn find<'a>(&'a self, path_info: &'a str) -> Option<(&'a Mountpoint, &'a str)> {
        let mut best: Option<(&Mountpoint, &str)> = None;
        for m in &self.mounts {
            let rest = match path_info.strip_prefix(m.prefix.as_str()) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
                _ => continue,
            };
            match best {
                Some((b, _)) if b.prefix.len() >= m.prefix.len() => {}
                _ => best = Some((m, rest)),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mkmount(dir: &Path) -> Mountpoint {
        Mountpoint::new("", dir).unwrap()
    }

    #[tokio::test]
    async fn strict_stays_inside_docroot() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub/f.txt"), b"x").unwrap();
        let m = mkmount(tmp.path());

        let p = m
            .resolve_strict(&DavPath::new("", "/sub/f.txt"))
            .await
            .unwrap();
        assert!(p.starts_with(m.docroot()));

        // dot-dot escape comes back as NotFound.
        let r = m.resolve_strict(&DavPath::new("", "/../..")).await;
        assert!(matches!(r, Err(DavError::NotFound)));
        // missing component too.
        let r = m.resolve_strict(&DavPath::new("", "/nope")).await;
        assert!(matches!(r, Err(DavError::NotFound)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escape_is_refused() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), b"s").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();
        let m = mkmount(tmp.path());

        let r = m.resolve_strict(&DavPath::new("", "/link/secret")).await;
        assert!(matches!(r, Err(DavError::NotFound)));
    }

    #[tokio::test]
    async fn parent_resolution_parity() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"x").unwrap();
        let m = mkmount(tmp.path());

        // strict success implies parent success with the same result.
        let path = DavPath::new("", "/a.txt");
        let strict = m.resolve_strict(&path).await.unwrap();
        let parent = m.resolve_parent(&path).await.unwrap();
        assert_eq!(strict, parent);

        // parent resolution works for a missing leaf...
        let missing = DavPath::new("", "/b.txt");
        assert!(m.resolve_strict(&missing).await.is_err());
        let p = m.resolve_parent(&missing).await.unwrap();
        assert_eq!(p, tmp.path().canonicalize().unwrap().join("b.txt"));

        // ...but not for a missing parent, or a dot-dot leaf.
        let r = m.resolve_parent(&DavPath::new("", "/no/dir.txt")).await;
        assert!(matches!(r, Err(DavError::Conflict)));
        let r = m.resolve_parent(&DavPath::new("", "/a/..")).await;
        assert!(matches!(r, Err(DavError::Conflict)));
    }

    #[test]
    fn table_longest_prefix_wins() {
        let t1 = tempfile::tempdir().unwrap();
        let t2 = tempfile::tempdir().unwrap();
        let table = MountTable::new(vec![
            Mountpoint::new("/a", t1.path()).unwrap(),
            Mountpoint::new("/a/b", t2.path()).unwrap(),
        ]);
        let (m, rest) = table.find("/a/b/c").unwrap();
        assert_eq!(m.prefix(), "/a/b");
        assert_eq!(rest, "/c");
        let (m, rest) = table.find("/a/bc").unwrap();
        assert_eq!(m.prefix(), "/a");
        assert_eq!(rest, "/bc");
        // prefix must match on a segment boundary.
        assert!(table.find("/ab").is_none());
    }
}
