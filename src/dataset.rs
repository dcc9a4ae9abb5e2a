use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::errors::Result;

pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "bmp"];
pub const SIDECAR_EXTENSION: &str = "txt";

/// An image and the `.txt` file holding its tags, if there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedImage {
    pub image_path: PathBuf,
    pub text_path: Option<PathBuf>,
}

impl TaggedImage {
    pub fn new(image_path: PathBuf) -> Self {
        let candidate = sidecar_path(&image_path);
        let text_path = candidate.is_file().then_some(candidate);
        Self {
            image_path,
            text_path,
        }
    }

    pub fn file_name(&self) -> String {
        self.image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The sidecar path, but only if the file still exists.
    pub fn live_text_path(&self) -> Option<&Path> {
        self.text_path.as_deref().filter(|path| path.is_file())
    }

    /// Raw sidecar contents; `None` when there is no sidecar on disk.
    pub fn read_text(&self) -> Result<Option<String>> {
        match self.live_text_path() {
            Some(path) => Ok(Some(fs::read_to_string(path)?)),
            None => Ok(None),
        }
    }
}

/// `<dir>/<base>.txt` for `<dir>/<base>.<ext>`.
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension(SIDECAR_EXTENSION)
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Images directly inside `dir` (no subdirectories), sorted by file name.
pub fn scan_folder(dir: &Path) -> Result<Vec<TaggedImage>> {
    let mut items = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            items.push(TaggedImage::new(entry.into_path()));
        }
    }

    let paired = items.iter().filter(|item| item.text_path.is_some()).count();
    log::info!(
        "Scanned {}: {} images, {} with tags",
        dir.display(),
        items.len(),
        paired
    );
    Ok(items)
}

/// Trimmed, non-empty search inputs.
pub fn normalize_keywords(inputs: &[String]) -> Vec<String> {
    inputs
        .iter()
        .map(|input| input.trim())
        .filter(|input| !input.is_empty())
        .map(str::to_string)
        .collect()
}

/// Positions of the items whose sidecar contains every keyword, ignoring case.
///
/// With no keywords every position is returned. Items without a readable
/// sidecar never match a non-empty keyword list.
pub fn filter(items: &[TaggedImage], keywords: &[String]) -> Vec<usize> {
    if keywords.is_empty() {
        return (0..items.len()).collect();
    }

    let needles: Vec<String> = keywords.iter().map(|kw| kw.to_lowercase()).collect();

    items
        .par_iter()
        .enumerate()
        .filter(|(_, item)| match item.read_text() {
            Ok(Some(text)) => {
                let haystack = text.to_lowercase();
                needles.iter().all(|needle| haystack.contains(needle.as_str()))
            }
            Ok(None) => false,
            Err(err) => {
                log::warn!("Skipping {} in search: {}", item.file_name(), err);
                false
            }
        })
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn scan_pairs_images_with_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "cat.png", "");
        touch(dir.path(), "cat.txt", "blue_eyes, long_hair");
        touch(dir.path(), "dog.png", "");
        touch(dir.path(), "notes.txt", "not an image");
        touch(dir.path(), "Bird.JPEG", "");
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested"), "deep.png", "");

        let items = scan_folder(dir.path()).unwrap();

        let names: Vec<_> = items.iter().map(TaggedImage::file_name).collect();
        assert_eq!(names, vec!["Bird.JPEG", "cat.png", "dog.png"]);
        assert_eq!(items[0].text_path, None);
        assert_eq!(items[1].text_path, Some(dir.path().join("cat.txt")));
        assert_eq!(items[2].text_path, None);
    }

    #[test]
    fn missing_sidecar_reads_as_no_tags() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "cat.png", "");
        let txt = touch(dir.path(), "cat.txt", "smile");
        let item = TaggedImage::new(dir.path().join("cat.png"));

        fs::remove_file(txt).unwrap();

        assert!(item.text_path.is_some());
        assert_eq!(item.read_text().unwrap(), None);
    }

    #[test]
    fn empty_keywords_pass_everything_through() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png", "");
        touch(dir.path(), "b.png", "");
        let items = scan_folder(dir.path()).unwrap();

        assert_eq!(filter(&items, &[]), vec![0, 1]);
    }

    #[test]
    fn filter_requires_every_keyword_ignoring_case() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png", "");
        touch(dir.path(), "a.txt", "1girl, Blonde_Hair, smile");
        touch(dir.path(), "b.png", "");
        touch(dir.path(), "b.txt", "1girl, black_hair");
        touch(dir.path(), "c.png", "");
        touch(dir.path(), "d.png", "");
        touch(dir.path(), "d.txt", "blonde_hair, SMILE, solo");
        let items = scan_folder(dir.path()).unwrap();

        assert_eq!(filter(&items, &keywords(&["blonde", "smile"])), vec![0, 3]);
        assert_eq!(filter(&items, &keywords(&["HAIR"])), vec![0, 1, 3]);
        assert!(filter(&items, &keywords(&["missing"])).is_empty());
    }

    #[test]
    fn normalize_drops_blank_inputs() {
        let inputs = keywords(&["  blue ", "", "   ", "hair"]);
        assert_eq!(normalize_keywords(&inputs), keywords(&["blue", "hair"]));
    }
}
