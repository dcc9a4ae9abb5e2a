use std::path::{Path, PathBuf};

use crate::errors::{EditorError, Result};
use crate::fsutil;

/// One-slot snapshot of a tag file taken right before a tag was deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UndoBuffer {
    #[default]
    Empty,
    Armed { text_path: PathBuf, snapshot: String },
}

impl UndoBuffer {
    /// Remember `snapshot` as the contents of `text_path`, replacing any earlier snapshot.
    pub fn arm(&mut self, text_path: &Path, snapshot: String) {
        *self = UndoBuffer::Armed {
            text_path: text_path.to_path_buf(),
            snapshot,
        };
    }

    pub fn clear(&mut self) {
        *self = UndoBuffer::Empty;
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, UndoBuffer::Armed { .. })
    }

    /// Write the snapshot back verbatim. The buffer is empty afterwards
    /// whether or not the write succeeded.
    pub fn restore(&mut self) -> Result<PathBuf> {
        match std::mem::take(self) {
            UndoBuffer::Empty => Err(EditorError::UndoUnavailable),
            UndoBuffer::Armed {
                text_path,
                snapshot,
            } => {
                fsutil::write_atomic(&text_path, snapshot.as_bytes())?;
                log::info!("Restored {}", text_path.display());
                Ok(text_path)
            }
        }
    }
}
