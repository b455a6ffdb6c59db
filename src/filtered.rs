//! Dot-file hiding on top of any [`FileSystem`].

use std::io::{self, Read, Seek, SeekFrom};

use tracing::debug;

use crate::error::{ListError, ShareError};
use crate::fs::{EntryInfo, FileSystem, Node};
use crate::path_filter::{is_hidden, is_hidden_name};

/// A [`FileSystem`] that refuses to open names with a hidden segment and
/// leaves hidden entries out of directory listings.
#[derive(Debug, Clone)]
pub struct FilteredFileAccess<F> {
    inner: F,
}

impl<F: FileSystem> FilteredFileAccess<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F: FileSystem> FileSystem for FilteredFileAccess<F> {
    type Node = FilteredNode<F::Node>;

    fn open(&self, path: &str) -> Result<Self::Node, ShareError> {
        if is_hidden(path) {
            debug!(path, "refusing hidden path");
            return Err(ShareError::Forbidden {
                path: path.to_string(),
            });
        }
        let node = self.inner.open(path)?;
        Ok(FilteredNode { inner: node })
    }
}

/// Node returned by [`FilteredFileAccess`]. Content passes through as-is.
#[derive(Debug)]
pub struct FilteredNode<N> {
    inner: N,
}

fn retain_visible(entries: &mut Vec<EntryInfo>) {
    entries.retain(|entry| !is_hidden_name(&entry.name));
}

impl<N: Node> Node for FilteredNode<N> {
    fn stat(&self) -> Result<EntryInfo, ShareError> {
        self.inner.stat()
    }

    fn read_dir(&mut self, limit: Option<usize>) -> Result<Vec<EntryInfo>, ListError> {
        match self.inner.read_dir(limit) {
            Ok(mut entries) => {
                retain_visible(&mut entries);
                Ok(entries)
            }
            Err(mut err) => {
                retain_visible(&mut err.entries);
                Err(err)
            }
        }
    }
}

impl<N: Node> Read for FilteredNode<N> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<N: Node> Seek for FilteredNode<N> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
