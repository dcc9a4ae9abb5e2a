use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::color::Rgba;
use crate::errors::{EditorError, Result};
use crate::fsutil;

/// Category given to tags nobody has categorized yet.
pub const DEFAULT_CATEGORY: &str = "その他・未設定・デフォルト";

/// Tag button background when the category has no usable color.
pub const DEFAULT_TAG_COLOR: Rgba = Rgba::opaque(0x6A, 0x48, 0xF9);

/// Category picker background when the category has no usable color.
pub const PICKER_FALLBACK_COLOR: Rgba = Rgba::opaque(0x80, 0x80, 0x80);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryColor {
    pub name: String,
    pub color: Option<String>,
}

/// Category colors in file order.
pub fn load_colors(path: &Path) -> Result<Vec<CategoryColor>> {
    let map: Map<String, Value> = read_json_object(path)?;
    Ok(map
        .into_iter()
        .map(|(name, value)| CategoryColor {
            name,
            color: value.as_str().map(str::to_string),
        })
        .collect())
}

pub fn load_assignments(path: &Path) -> Result<BTreeMap<String, String>> {
    read_json_object(path)
}

fn read_json_object<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(EditorError::MissingResource(path.to_path_buf()));
    }
    let json = fs::read_to_string(path)?;
    serde_json::from_str(&json)
        .map_err(|err| EditorError::MalformedResource(path.to_path_buf(), err.to_string()))
}

pub fn save_assignments(path: &Path, assignments: &BTreeMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(assignments)?;
    fsutil::write_atomic(path, json.as_bytes())
}

/// Color for `category`, or `fallback` when the category is unknown or its
/// color is empty or unparsable.
pub fn resolve_color(category: Option<&str>, colors: &[CategoryColor], fallback: Rgba) -> Rgba {
    category
        .and_then(|name| colors.iter().find(|c| c.name == name))
        .and_then(|c| c.color.as_deref())
        .filter(|code| !code.trim().is_empty())
        .and_then(Rgba::parse_hex)
        .unwrap_or(fallback)
}

/// Both category resources plus the bookkeeping needed to persist new
/// assignments.
#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    colors: Vec<CategoryColor>,
    assignments: BTreeMap<String, String>,
    default_category: String,
    dirty: bool,
    // false when the assignments file exists but could not be parsed
    writable: bool,
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORY)
    }
}

impl CategoryCatalog {
    pub fn new(default_category: &str) -> Self {
        Self {
            colors: Vec::new(),
            assignments: BTreeMap::new(),
            default_category: default_category.to_string(),
            dirty: false,
            writable: true,
        }
    }

    /// Load both resources. Problems are returned as warnings next to a
    /// usable (possibly empty) catalog.
    pub fn open(
        colors_path: &Path,
        assignments_path: &Path,
        default_category: &str,
    ) -> (Self, Vec<EditorError>) {
        let mut catalog = Self::new(default_category);
        let mut warnings = Vec::new();

        match load_colors(colors_path) {
            Ok(colors) => {
                log::info!("Loaded {} category colors", colors.len());
                catalog.colors = colors;
            }
            Err(err) => {
                log::warn!("{}", err);
                warnings.push(err);
            }
        }

        match load_assignments(assignments_path) {
            Ok(assignments) => {
                log::info!("Loaded {} tag categories", assignments.len());
                catalog.assignments = assignments;
            }
            Err(err) => {
                if matches!(err, EditorError::MalformedResource(..)) {
                    log::error!("{}; tag categories will not be saved this session", err);
                    catalog.writable = false;
                } else {
                    log::warn!("{}", err);
                }
                warnings.push(err);
            }
        }

        (catalog, warnings)
    }

    pub fn colors(&self) -> &[CategoryColor] {
        &self.colors
    }

    pub fn assignments(&self) -> &BTreeMap<String, String> {
        &self.assignments
    }

    pub fn category_of(&self, tag: &str) -> Option<&str> {
        self.assignments.get(tag).map(String::as_str)
    }

    /// Category of `tag`, assigning the default category first if it has none.
    pub fn ensure_assigned(&mut self, tag: &str) -> &str {
        if !self.assignments.contains_key(tag) {
            self.assignments
                .insert(tag.to_string(), self.default_category.clone());
            self.dirty = true;
        }
        &self.assignments[tag]
    }

    pub fn assign(&mut self, tag: &str, category: &str) {
        let previous = self
            .assignments
            .insert(tag.to_string(), category.to_string());
        if previous.as_deref() != Some(category) {
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        if !self.writable {
            log::warn!(
                "Skipping save of {}: the file on disk could not be parsed",
                path.display()
            );
            return Ok(());
        }
        save_assignments(path, &self.assignments)?;
        self.dirty = false;
        log::debug!("Saved {} tag categories to {}", self.assignments.len(), path.display());
        Ok(())
    }

    /// Returns whether anything was written.
    pub fn save_if_dirty(&mut self, path: &Path) -> Result<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.save(path)?;
        Ok(!self.dirty)
    }

    pub fn color_for_tag(&self, tag: &str, fallback: Rgba) -> Rgba {
        resolve_color(self.category_of(tag), &self.colors, fallback)
    }

    pub fn color_for_category(&self, category: &str, fallback: Rgba) -> Rgba {
        resolve_color(Some(category), &self.colors, fallback)
    }
}
