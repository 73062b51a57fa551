//! Script store: generated scripts as plain UTF-8 files.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::{ForgeError, Result};

fn check_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ForgeError::validation("script file", "path", "no filename provided"));
    }
    Ok(())
}

/// Write `script` to `path`, replacing any existing file
pub fn save(script: &str, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    check_path(path)?;
    fs::write(path, script).map_err(|source| ForgeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = script.len(), "script saved");
    Ok(())
}

/// Read a previously saved script back verbatim
pub fn load(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    check_path(path)?;
    let text = fs::read_to_string(path).map_err(|source| ForgeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = text.len(), "script loaded");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("network.py");
        let script = "from brian2 import *\n\nrun(100*ms, report='text')\n";

        save(script, &path).unwrap();
        assert_eq!(load(&path).unwrap(), script);

        save("from brian2 import *\n", &path).unwrap();
        assert_eq!(load(&path).unwrap(), "from brian2 import *\n");
    }

    #[test]
    fn test_empty_path() {
        assert!(matches!(
            save("x = 1\n", ""),
            Err(ForgeError::Validation { field, .. }) if field == "path"
        ));
        assert!(matches!(load(""), Err(ForgeError::Validation { .. })));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.py");
        match load(&path) {
            Err(ForgeError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected I/O error, got {other:?}"),
        }
    }
}
