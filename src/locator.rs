use std::path::{Path, PathBuf};

/// Answers "which of these conventional files exists?" so that planning and
/// option loading stay deterministic under test.
pub trait Locator: Send + Sync {
    /// Returns the concrete path for `candidate` if it exists.
    fn resolve(&self, candidate: &Path) -> Option<PathBuf>;

    /// First existing candidate, in the given order.
    fn locate(&self, candidates: &[&str]) -> Option<PathBuf> {
        candidates
            .iter()
            .find_map(|candidate| self.resolve(Path::new(candidate)))
    }
}

/// Filesystem locator rooted at a directory. Relative candidates are joined
/// onto the root and `~/` expands to the home directory.
#[derive(Debug, Clone)]
pub struct FsLocator {
    root: PathBuf,
}

impl FsLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn current_dir() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn expand(&self, candidate: &Path) -> Option<PathBuf> {
        if let Ok(rest) = candidate.strip_prefix("~") {
            return dirs::home_dir().map(|home| home.join(rest));
        }
        if candidate.is_absolute() {
            Some(candidate.to_path_buf())
        } else {
            Some(self.root.join(candidate))
        }
    }
}

impl Locator for FsLocator {
    fn resolve(&self, candidate: &Path) -> Option<PathBuf> {
        self.expand(candidate).filter(|path| path.is_file())
    }
}
