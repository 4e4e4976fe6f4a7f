//! Caller-side collaborators around the pure pipeline: finding a class's compiled
//! bytes on disk and retrying after a build when they are missing.

use crate::canonical::Grammar;
use crate::descriptor::ClassDescriptor;
use crate::error::CoreError;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Resolves dotted binary names against class output directories.
#[derive(Debug, Clone, Default)]
pub struct ClassLocator {
    roots: Vec<PathBuf>,
}

impl ClassLocator {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// `a.b.Outer$Inner` -> `a/b/Outer$Inner.class`
    pub fn relative_path(binary_name: &str) -> PathBuf {
        let mut path: PathBuf = binary_name.split('.').collect();
        path.set_extension("class");
        path
    }

    pub fn locate(&self, binary_name: &str) -> Option<PathBuf> {
        let relative = Self::relative_path(binary_name);
        self.roots
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.is_file())
    }

    pub fn load(&self, binary_name: &str) -> Result<Vec<u8>, CoreError> {
        match self.locate(binary_name) {
            Some(path) => load(&path),
            None => Err(CoreError::unavailable(
                Self::relative_path(binary_name),
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} not found in {} class root(s)", binary_name, self.roots.len()),
                ),
            )),
        }
    }
}

/// Read a class file; any I/O failure means the artifact is unavailable.
pub fn load(path: &Path) -> Result<Vec<u8>, CoreError> {
    std::fs::read(path).map_err(|e| CoreError::unavailable(path, e))
}

/// Fetch bytes and compute the id; while the artifact is unavailable, run `rebuild`
/// and try again, up to `attempts` rebuilds. Every other failure is returned as is.
///
/// The descriptor is returned with the id so both describe the same fetched bytes.
pub fn compute_with_rebuild<F, R>(
    mut fetch: F,
    mut rebuild: R,
    attempts: u32,
    grammar: Grammar,
) -> Result<(ClassDescriptor, i64), CoreError>
where
    F: FnMut() -> Result<Vec<u8>, CoreError>,
    R: FnMut() -> io::Result<()>,
{
    let mut rebuilds = 0;
    loop {
        let err = match fetch() {
            Ok(bytes) => {
                let desc = crate::reader::read(&bytes)?;
                let id = crate::compute_structural_id_from_descriptor(&desc, grammar)?;
                return Ok((desc, id));
            }
            Err(err) => err,
        };
        if !err.is_retryable() || rebuilds >= attempts {
            return Err(err);
        }
        rebuilds += 1;
        tracing::info!(attempt = rebuilds, error = %err, "artifact unavailable, rebuilding");
        if let Err(build_err) = rebuild() {
            tracing::warn!(error = %build_err, "rebuild failed");
            return Err(err);
        }
    }
}

/// A rebuild step that runs an external build command, e.g. `["mvn", "-q", "compile"]`.
pub fn command_rebuilder(command: Vec<String>, cwd: PathBuf) -> impl FnMut() -> io::Result<()> {
    move || {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty rebuild command"))?;
        let status = Command::new(program).args(args).current_dir(&cwd).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("rebuild command exited with {}", status)))
        }
    }
}
