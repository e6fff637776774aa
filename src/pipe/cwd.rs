use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::{debug, warn};

use crate::Result;

/// The working directory is process-global. Holding this lock gives exclusive use of it.
static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Puts the previous working directory back when dropped
struct RestoreDir(PathBuf);

impl Drop for RestoreDir {
    fn drop(&mut self) {
        if let Err(err) = env::set_current_dir(&self.0) {
            warn!("Can't restore working directory {}: {err}", self.0.display());
        }
    }
}

/// Run `f` with `dir` as the process working directory
///
/// Calls are serialised within the process, and the previous working directory is restored
/// even if `f` fails or panics. This does nothing for other processes, which have their own
/// working directory.
pub fn in_directory<T>(dir: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    // poisoned only by a panic in f, after RestoreDir already ran
    let _lock = CWD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let previous = env::current_dir()?;
    env::set_current_dir(dir)?;
    let _restore = RestoreDir(previous);
    debug!("Working directory is now {}", dir.display());
    f()
}

/// Resolve a relative path against the process working directory. Absolute paths are returned
/// as they are.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let _lock = CWD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(env::current_dir()?.join(path))
}
