//! Filesystem capabilities the server is built on.
//!
//! [`FileSystem`] opens slash-delimited names and [`Node`] is the opened
//! handle. Both are blocking; the server runs them on the blocking pool.
//! A node is closed when it is dropped.

use std::fs::{self, DirEntry, File, FileType, Metadata, ReadDir};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{PathBuf, MAIN_SEPARATOR};
use std::time::SystemTime;

use crate::error::{ListError, ShareError};
use crate::utils::{base_name, clean_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Dir,
    Symlink,
    Other,
}

impl From<FileType> for NodeKind {
    fn from(file_type: FileType) -> Self {
        if file_type.is_dir() {
            NodeKind::Dir
        } else if file_type.is_file() {
            NodeKind::File
        } else if file_type.is_symlink() {
            NodeKind::Symlink
        } else {
            NodeKind::Other
        }
    }
}

/// Descriptor of a file or directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl EntryInfo {
    pub fn from_metadata(name: impl Into<String>, metadata: &Metadata) -> Self {
        Self {
            name: name.into(),
            kind: metadata.file_type().into(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }
}

/// Something that resolves slash-delimited names to opened nodes.
pub trait FileSystem: Send + Sync {
    type Node: Node;

    fn open(&self, path: &str) -> Result<Self::Node, ShareError>;
}

/// An opened file or directory.
///
/// File content is read through `Read` and `Seek`; directories fail both.
pub trait Node: Read + Seek + Send + 'static {
    fn stat(&self) -> Result<EntryInfo, ShareError>;

    /// Reads directory entries in the order the platform yields them.
    ///
    /// `None` reads everything that is left. `Some(n)` reads at most `n`
    /// entries, and the next call continues where this one stopped. Once
    /// the directory is exhausted an empty list is returned.
    fn read_dir(&mut self, limit: Option<usize>) -> Result<Vec<EntryInfo>, ListError>;
}

/// A directory on disk that every opened name is confined to.
#[derive(Debug, Clone)]
pub struct RootDir {
    root: PathBuf,
}

impl RootDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, ShareError> {
        if name.contains('\0') || (MAIN_SEPARATOR != '/' && name.contains(MAIN_SEPARATOR)) {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid character in file path").into());
        }
        let cleaned = clean_path(name);
        Ok(cleaned
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

impl FileSystem for RootDir {
    type Node = RootNode;

    fn open(&self, path: &str) -> Result<RootNode, ShareError> {
        let full = self.resolve(path)?;
        let metadata = fs::metadata(&full)?;
        let name = base_name(&clean_path(path)).to_string();

        let inner = if metadata.is_dir() {
            Inner::Dir(None)
        } else {
            Inner::File(File::open(&full)?)
        };
        Ok(RootNode { path: full, name, inner })
    }
}

/// Describes one listed entry, or `None` if it vanished since the
/// directory was read.
fn entry_info(entry: io::Result<DirEntry>) -> io::Result<Option<EntryInfo>> {
    let entry = entry?;
    match entry.metadata() {
        Ok(metadata) => Ok(Some(EntryInfo::from_metadata(
            entry.file_name().to_string_lossy().into_owned(),
            &metadata,
        ))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

#[derive(Debug)]
enum Inner {
    File(File),
    /// Cursor is created on the first `read_dir` call.
    Dir(Option<ReadDir>),
}

/// A node opened by [`RootDir`].
#[derive(Debug)]
pub struct RootNode {
    path: PathBuf,
    name: String,
    inner: Inner,
}

impl RootNode {
    fn not_a_file() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "is a directory")
    }
}

impl Node for RootNode {
    fn stat(&self) -> Result<EntryInfo, ShareError> {
        let metadata = match &self.inner {
            Inner::File(file) => file.metadata()?,
            Inner::Dir(_) => fs::metadata(&self.path)?,
        };
        Ok(EntryInfo::from_metadata(self.name.clone(), &metadata))
    }

    fn read_dir(&mut self, limit: Option<usize>) -> Result<Vec<EntryInfo>, ListError> {
        let cursor = match &mut self.inner {
            Inner::File(_) => {
                return Err(ListError::new(
                    Vec::new(),
                    io::Error::new(io::ErrorKind::Other, "not a directory"),
                ))
            }
            Inner::Dir(Some(cursor)) => cursor,
            Inner::Dir(slot) => match fs::read_dir(&self.path) {
                Ok(cursor) => slot.insert(cursor),
                Err(err) => return Err(ListError::new(Vec::new(), err)),
            },
        };

        let mut entries = Vec::new();
        while limit.map_or(true, |n| entries.len() < n) {
            let Some(entry) = cursor.next() else {
                break;
            };
            match entry_info(entry) {
                Ok(Some(info)) => entries.push(info),
                Ok(None) => {}
                Err(err) => return Err(ListError::new(entries, err)),
            }
        }
        Ok(entries)
    }
}

impl Read for RootNode {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::File(file) => file.read(buf),
            Inner::Dir(_) => Err(Self::not_a_file()),
        }
    }
}

impl Seek for RootNode {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.inner {
            Inner::File(file) => file.seek(pos),
            Inner::Dir(_) => Err(Self::not_a_file()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::write(dir.path().join(".secret"), "s3cr3t").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.txt"), "bee").unwrap();
        dir
    }

    fn names(entries: &[EntryInfo]) -> Vec<String> {
        let mut names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_open_file_and_read() {
        let dir = fixture();
        let root = RootDir::new(dir.path());

        let mut node = root.open("/a.txt").unwrap();
        let info = node.stat().unwrap();
        assert_eq!(info.name, "a.txt");
        assert_eq!(info.kind, NodeKind::File);
        assert_eq!(info.size, 5);

        let mut content = String::new();
        node.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let dir = fixture();
        let root = RootDir::new(dir.path());

        let err = root.open("/missing.txt").unwrap_err();
        assert!(matches!(err, ShareError::NotFound(_)));
    }

    #[test]
    fn test_open_below_a_file_is_not_found() {
        let dir = fixture();
        let root = RootDir::new(dir.path());

        let err = root.open("/a.txt/x").unwrap_err();
        assert!(matches!(err, ShareError::NotFound(_)));
    }

    #[test]
    fn test_open_rejects_nul() {
        let dir = fixture();
        let root = RootDir::new(dir.path());

        let err = root.open("/a.txt\0").unwrap_err();
        assert!(matches!(err, ShareError::Io(_)));
    }

    #[test]
    fn test_parent_segments_stay_inside_root() {
        let outer = TempDir::new().unwrap();
        fs::write(outer.path().join("outside.txt"), "nope").unwrap();
        fs::create_dir(outer.path().join("share")).unwrap();
        fs::write(outer.path().join("share").join("inside.txt"), "yes").unwrap();
        let root = RootDir::new(outer.path().join("share"));

        let err = root.open("/../outside.txt").unwrap_err();
        assert!(matches!(err, ShareError::NotFound(_)));
        assert!(root.open("/../../inside.txt").is_ok());
    }

    #[test]
    fn test_read_dir_lists_everything() {
        let dir = fixture();
        let root = RootDir::new(dir.path());

        let mut node = root.open("/").unwrap();
        assert!(node.stat().unwrap().is_dir());
        let entries = node.read_dir(None).unwrap();
        assert_eq!(names(&entries), vec![".secret", "a.txt", "sub"]);

        let sub = entries.iter().find(|e| e.name == "sub").unwrap();
        assert_eq!(sub.kind, NodeKind::Dir);

        assert!(node.read_dir(None).unwrap().is_empty());
    }

    #[test]
    fn test_read_dir_with_limit_resumes() {
        let dir = fixture();
        let root = RootDir::new(dir.path());

        let mut node = root.open("/").unwrap();
        let mut seen = node.read_dir(Some(2)).unwrap();
        assert_eq!(seen.len(), 2);
        seen.extend(node.read_dir(Some(2)).unwrap());
        assert_eq!(names(&seen), vec![".secret", "a.txt", "sub"]);
        assert!(node.read_dir(Some(2)).unwrap().is_empty());
    }

    #[test]
    fn test_directory_node_refuses_reads() {
        let dir = fixture();
        let root = RootDir::new(dir.path());

        let mut node = root.open("/sub").unwrap();
        let mut buf = [0u8; 4];
        assert!(node.read(&mut buf).is_err());
    }

    #[test]
    fn test_file_node_refuses_listing() {
        let dir = fixture();
        let root = RootDir::new(dir.path());

        let mut node = root.open("/a.txt").unwrap();
        let err = node.read_dir(None).unwrap_err();
        assert!(err.entries.is_empty());
        assert!(matches!(err.source, ShareError::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_vanished_entry_is_skipped() {
        let dir = fixture();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        fs::remove_file(dir.path().join("a.txt")).unwrap();

        let mut names = Vec::new();
        for entry in entries {
            if let Some(info) = entry_info(entry).unwrap() {
                names.push(info.name);
            }
        }
        names.sort();
        assert_eq!(names, vec![".secret", "sub"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_entries_are_not_followed_when_listing() {
        let dir = fixture();
        std::os::unix::fs::symlink(dir.path().join("sub"), dir.path().join("link")).unwrap();
        let root = RootDir::new(dir.path());

        let entries = root.open("/").unwrap().read_dir(None).unwrap();
        let link = entries.iter().find(|e| e.name == "link").unwrap();
        assert_eq!(link.kind, NodeKind::Symlink);

        // Opening through the link follows it.
        let node = root.open("/link/b.txt").unwrap();
        assert_eq!(node.stat().unwrap().size, 3);
    }
}
