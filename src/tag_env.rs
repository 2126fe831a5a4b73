// SPDX-FileCopyrightText: 2020 Serokell <https://serokell.io/>
//
// SPDX-License-Identifier: MPL-2.0

use log::{debug, error};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagEnvError {
    #[error("Failed to read tag environment file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("Failed to write tag environment file {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("Failed to restore tag environment file {0}: {1}")]
    Restore(PathBuf, std::io::Error),
}

pub fn tag_line(key: &str, tag: &str) -> String {
    format!("{}={}\n", key, tag)
}

/// Holds the tag environment file rewritten to the tag being deployed.
///
/// The previous content comes back on `restore`, or on drop if `restore` was
/// never reached. A file which did not exist beforehand is removed again.
#[derive(Debug)]
pub struct TagEnv {
    path: PathBuf,
    previous: Option<String>,
    restored: bool,
}

impl TagEnv {
    pub fn write(path: &Path, key: &str, tag: &str) -> Result<TagEnv, TagEnvError> {
        let previous = match std::fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(TagEnvError::Read(path.to_path_buf(), e)),
        };

        debug!("Writing {} with {}={}", path.display(), key, tag);

        std::fs::write(path, tag_line(key, tag))
            .map_err(|e| TagEnvError::Write(path.to_path_buf(), e))?;

        Ok(TagEnv {
            path: path.to_path_buf(),
            previous,
            restored: false,
        })
    }

    pub fn restore(mut self) -> Result<(), TagEnvError> {
        self.restore_previous()
    }

    fn restore_previous(&mut self) -> Result<(), TagEnvError> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;

        debug!("Restoring {}", self.path.display());

        let result = match &self.previous {
            Some(content) => std::fs::write(&self.path, content),
            None => match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };

        result.map_err(|e| TagEnvError::Restore(self.path.clone(), e))
    }
}

impl Drop for TagEnv {
    fn drop(&mut self) {
        if let Err(e) = self.restore_previous() {
            error!("{}", e);
        }
    }
}
