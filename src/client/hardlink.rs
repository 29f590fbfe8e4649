//! Hardlinking torrent files into a label directory.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, trace};

use crate::config::PathMapper;

use super::ClientError;

/// Files to link for one relabel, as local `(source, target)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPlan {
    links: Vec<(PathBuf, PathBuf)>,
}

impl LinkPlan {
    /// Plans links for `files` (relative to the torrent save path) from
    /// `save_path` into `label_path`. Both roots are daemon-side and are mapped
    /// to local paths through `mapper`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnsafeFileName`] if any file name is absolute or
    /// climbs out of its root with `..`.
    pub fn new(
        save_path: &Path,
        label_path: &Path,
        files: &[PathBuf],
        mapper: &PathMapper,
    ) -> Result<Self, ClientError> {
        if let Some(file) = files.iter().find(|file| !is_contained(file)) {
            return Err(ClientError::unsafe_file_name(file));
        }

        let source_root = mapper.to_local(save_path);
        let target_root = mapper.to_local(label_path);
        let links = files
            .iter()
            .map(|file| (source_root.join(file), target_root.join(file)))
            .collect();
        Ok(Self { links })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    #[must_use]
    pub fn links(&self) -> &[(PathBuf, PathBuf)] {
        &self.links
    }

    /// Creates every link.
    ///
    /// All sources are checked before anything is created. Parent directories of
    /// targets are created as needed. A target that is already a link to its
    /// source counts as done. Links created before a failure are left in place.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingSource`] if any source is absent, or
    /// [`ClientError::Hardlink`] for the first directory or link that fails.
    pub fn execute(&self) -> Result<usize, ClientError> {
        for (source, _) in &self.links {
            fs::metadata(source).map_err(|error| ClientError::missing_source(source, error))?;
        }

        let mut created = 0;
        for (source, target) in &self.links {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|error| ClientError::hardlink(source, target, error))?;
            }
            match fs::hard_link(source, target) {
                Ok(()) => {
                    trace!(source = %source.display(), target = %target.display(), "Linked file");
                    created += 1;
                }
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                    if !same_file(source, target)
                        .map_err(|error| ClientError::hardlink(source, target, error))?
                    {
                        return Err(ClientError::hardlink(source, target, error));
                    }
                    trace!(target = %target.display(), "Link already present");
                }
                Err(error) => return Err(ClientError::hardlink(source, target, error)),
            }
        }

        debug!(planned = self.links.len(), created, "Hardlinked torrent files");
        Ok(created)
    }
}

/// True for a non-empty relative path made only of normal components.
fn is_contained(file: &Path) -> bool {
    file.components().next().is_some()
        && file
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let a = fs::metadata(a)?;
    let b = fs::metadata(b)?;
    Ok(a.dev() == b.dev() && a.ino() == b.ino())
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}
