//! Translation of daemon-side paths to local paths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Maps paths as the torrent daemon reports them onto paths visible to this process.
///
/// The longest matching prefix wins; paths without a match are returned unchanged.
/// Matching is component-wise, so `/data` does not match `/database`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMapper {
    // Sorted longest prefix first.
    mappings: Vec<(PathBuf, PathBuf)>,
}

impl PathMapper {
    #[must_use]
    pub fn new(mappings: &BTreeMap<String, String>) -> Self {
        let mut mappings: Vec<(PathBuf, PathBuf)> = mappings
            .iter()
            .map(|(remote, local)| (PathBuf::from(remote), PathBuf::from(local)))
            .collect();
        mappings.sort_by(|(a, _), (b, _)| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });
        Self { mappings }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Returns the local path for `remote`.
    #[must_use]
    pub fn to_local(&self, remote: &Path) -> PathBuf {
        for (prefix, local) in &self.mappings {
            if let Ok(rest) = remote.strip_prefix(prefix) {
                if rest.as_os_str().is_empty() {
                    return local.clone();
                }
                return local.join(rest);
            }
        }
        remote.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(pairs: &[(&str, &str)]) -> PathMapper {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
            .collect();
        PathMapper::new(&map)
    }

    #[test]
    fn test_longest_prefix_wins() {
        let m = mapper(&[("/data", "/mnt/a"), ("/data/movies", "/mnt/b")]);
        assert_eq!(
            m.to_local(Path::new("/data/movies/x.mkv")),
            PathBuf::from("/mnt/b/x.mkv")
        );
        assert_eq!(
            m.to_local(Path::new("/data/tv/y.mkv")),
            PathBuf::from("/mnt/a/tv/y.mkv")
        );
    }

    #[test]
    fn test_prefix_matches_whole_components() {
        let m = mapper(&[("/data", "/mnt/a")]);
        assert_eq!(
            m.to_local(Path::new("/database/x")),
            PathBuf::from("/database/x")
        );
        assert_eq!(m.to_local(Path::new("/data")), PathBuf::from("/mnt/a"));
    }

    #[test]
    fn test_empty_mapper_is_identity() {
        let m = PathMapper::default();
        assert!(m.is_empty());
        assert_eq!(m.to_local(Path::new("/x/y")), PathBuf::from("/x/y"));
    }
}
