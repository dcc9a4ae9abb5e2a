use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::category::DEFAULT_CATEGORY;
use crate::errors::{EditorError, Result};

pub const SETTINGS_FILE: &str = "settings.json";

const DEFAULT_CATEGORY_ORDER: [&str; 16] = [
    "一般",
    "人数",
    "キャラ名",
    "作品名",
    "髪型",
    "髪色",
    "目の色",
    "表情",
    "眉",
    "衣装・服",
    "アクセサリ",
    "部位",
    "胸",
    "ポーズ・動作",
    DEFAULT_CATEGORY,
    "クオリティ",
];

/// Paths and preferences read from `settings.json` in the working directory.
/// Relative paths resolve against the working directory too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub translate_csv_path: PathBuf,
    pub category_color_map_path: PathBuf,
    pub tag_category_map_path: PathBuf,
    pub marked_file_path: PathBuf,
    pub category_order: Vec<String>,
    pub default_category: String,
    /// Tag button background for categories without a usable color.
    pub fallback_color: String,
    /// Font with Japanese glyphs; the platform font is tried when unset.
    pub font_path: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub japanese_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            translate_csv_path: PathBuf::from("translateMap.csv"),
            category_color_map_path: PathBuf::from("categoryColorMap.json"),
            tag_category_map_path: PathBuf::from("tagCategoryMap.json"),
            marked_file_path: PathBuf::from("marked.txt"),
            category_order: DEFAULT_CATEGORY_ORDER.iter().map(|c| c.to_string()).collect(),
            default_category: DEFAULT_CATEGORY.to_string(),
            fallback_color: "#FF6A48F9".to_string(),
            font_path: None,
            log_file: Some(PathBuf::from("tag-editor.log")),
            japanese_mode: true,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EditorError::MissingResource(path.to_path_buf()));
        }
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|err| EditorError::MalformedResource(path.to_path_buf(), err.to_string()))
    }

    /// Settings from `path`, or the defaults plus where they came from.
    pub fn load_or_default(path: &Path) -> (Self, SettingsSource) {
        match Self::load(path) {
            Ok(settings) => (settings, SettingsSource::File),
            Err(EditorError::MissingResource(_)) => (Self::default(), SettingsSource::Defaults),
            Err(err) => (Self::default(), SettingsSource::Fallback(err)),
        }
    }
}

/// How `Settings::load_or_default` arrived at its result.
#[derive(Debug)]
pub enum SettingsSource {
    File,
    /// No settings file; built-in defaults.
    Defaults,
    /// The file could not be used; built-in defaults.
    Fallback(EditorError),
}
