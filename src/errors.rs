use std::path::PathBuf;
use thiserror::Error;

/// Every failure a single user action can end with.
/// None of them are fatal: the GUI shows the message and the session keeps going.
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Resource not found: {}", .0.display())]
    MissingResource(PathBuf),

    #[error("Resource {} could not be parsed: {1}", .0.display())]
    MalformedResource(PathBuf, String),

    #[error("No image is selected")]
    NoSelection,

    #[error("Select a folder with images first")]
    NoFolder,

    #[error("Tag '{0}' is already present")]
    DuplicateTag(String),

    #[error("Tag is empty")]
    EmptyTag,

    #[error("Empty translations are not registered")]
    EmptyTranslation,

    #[error("Nothing to undo")]
    UndoUnavailable,

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Directory scan failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Image decoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Could not replace file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type Result<T> = std::result::Result<T, EditorError>;

impl From<EditorError> for String {
    fn from(err: EditorError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_to_string() {
        let err = EditorError::DuplicateTag("long_hair".to_string());
        assert_eq!(err.to_string(), "Tag 'long_hair' is already present");
    }

    #[test]
    fn test_missing_resource_names_path() {
        let err = EditorError::MissingResource(PathBuf::from("translateMap.csv"));
        let s: String = err.into();
        assert_eq!(s, "Resource not found: translateMap.csv");
    }
}
