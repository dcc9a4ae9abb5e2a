use std::path::{Path, PathBuf};

use crate::category::{CategoryCatalog, DEFAULT_TAG_COLOR, PICKER_FALLBACK_COLOR};
use crate::color::Rgba;
use crate::config::Settings;
use crate::dataset::{self, TaggedImage};
use crate::errors::{EditorError, Result};
use crate::fsutil;
use crate::marked;
use crate::ordering::{self, CategoryOrder};
use crate::tags;
use crate::translation::{self, TranslationDictionary};
use crate::undo::UndoBuffer;

const SUGGESTION_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Japanese,
    English,
}

/// One tag as the tag panel should draw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagView {
    /// The tag as stored in the sidecar file.
    pub tag: String,
    pub label: String,
    pub category: String,
    pub background: Rgba,
    pub foreground: Rgba,
    pub translated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryChoice {
    pub name: String,
    pub background: Rgba,
    pub foreground: Rgba,
}

/// Everything the editor knows, mutated only through one method per user action.
pub struct Session {
    settings: Settings,
    dictionary: TranslationDictionary,
    catalog: CategoryCatalog,
    order: CategoryOrder,
    fallback_color: Rgba,
    folder: Option<PathBuf>,
    items: Vec<TaggedImage>,
    visible: Vec<usize>,
    selected: Option<usize>,
    undo: UndoBuffer,
    mode: DisplayMode,
}

impl Session {
    /// Load the dictionary and category resources named in `settings`.
    /// Missing or unreadable resources come back as warnings; the session
    /// works with empty mappings in their place.
    pub fn open(settings: Settings) -> (Self, Vec<EditorError>) {
        let mut warnings = Vec::new();

        let dictionary = match TranslationDictionary::load(&settings.translate_csv_path) {
            Ok(dictionary) => dictionary,
            Err(err) => {
                log::warn!("{}", err);
                warnings.push(err);
                TranslationDictionary::default()
            }
        };

        if dictionary.is_empty() {
            log::warn!("Translation dictionary is empty; tags will be shown untranslated");
        }

        let (catalog, catalog_warnings) = CategoryCatalog::open(
            &settings.category_color_map_path,
            &settings.tag_category_map_path,
            &settings.default_category,
        );
        warnings.extend(catalog_warnings);

        let fallback_color = Rgba::parse_hex(&settings.fallback_color).unwrap_or_else(|| {
            log::warn!(
                "Invalid fallback color '{}', using the built-in one",
                settings.fallback_color
            );
            DEFAULT_TAG_COLOR
        });

        let mode = if settings.japanese_mode {
            DisplayMode::Japanese
        } else {
            DisplayMode::English
        };

        let session = Self {
            order: CategoryOrder::new(settings.category_order.iter().cloned()),
            settings,
            dictionary,
            catalog,
            fallback_color,
            folder: None,
            items: Vec::new(),
            visible: Vec::new(),
            selected: None,
            undo: UndoBuffer::Empty,
            mode,
        };
        (session, warnings)
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn items(&self) -> &[TaggedImage] {
        &self.items
    }

    /// Positions in [`Session::items`] currently shown in the grid.
    pub fn visible(&self) -> &[usize] {
        &self.visible
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_item(&self) -> Option<&TaggedImage> {
        self.selected.and_then(|idx| self.items.get(idx))
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn can_undo(&self) -> bool {
        self.undo.is_armed()
    }

    /// Scan `dir` and show every image in it. Returns the number of images.
    pub fn open_folder(&mut self, dir: &Path) -> Result<usize> {
        let items = dataset::scan_folder(dir)?;
        self.folder = Some(dir.to_path_buf());
        self.visible = (0..items.len()).collect();
        self.items = items;
        self.selected = None;
        self.undo.clear();
        Ok(self.items.len())
    }

    /// Show only the images whose tags contain every non-blank input.
    /// All blank inputs show everything again. Returns the number shown.
    pub fn search(&mut self, inputs: &[String]) -> Result<usize> {
        if self.folder.is_none() || self.items.is_empty() {
            return Err(EditorError::NoFolder);
        }
        let keywords = dataset::normalize_keywords(inputs);
        self.visible = dataset::filter(&self.items, &keywords);
        self.selected = None;
        self.undo.clear();
        log::info!(
            "Search {:?}: {} of {} images",
            keywords,
            self.visible.len(),
            self.items.len()
        );
        Ok(self.visible.len())
    }

    pub fn select(&mut self, idx: usize) -> Result<()> {
        if idx >= self.items.len() {
            return Err(EditorError::NoSelection);
        }
        if self.selected != Some(idx) {
            self.undo.clear();
        }
        self.selected = Some(idx);
        Ok(())
    }

    /// The selected image's tags, ordered by category and labelled for the
    /// current mode. Tags seen for the first time get the default category,
    /// which is saved before returning.
    pub fn tag_views(&mut self) -> Result<Vec<TagView>> {
        let Some(item) = self.selected_item() else {
            return Ok(Vec::new());
        };
        let Some(raw) = item.read_text()? else {
            return Ok(Vec::new());
        };

        let tags = tags::decode_for_edit(&raw);
        for tag in &tags {
            self.catalog.ensure_assigned(tag);
        }
        if let Err(err) = self
            .catalog
            .save_if_dirty(&self.settings.tag_category_map_path)
        {
            log::error!("Failed to save tag categories: {}", err);
        }

        let sorted = ordering::order_tags(&tags, self.catalog.assignments(), &self.order);
        Ok(sorted.into_iter().map(|tag| self.view_of(tag)).collect())
    }

    fn view_of(&self, tag: String) -> TagView {
        let category = self.catalog.category_of(&tag).unwrap_or_default().to_string();
        let background = self.catalog.color_for_tag(&tag, self.fallback_color);

        let translation = self.dictionary.lookup(&tag);
        let translated = translation.is_some();

        // Untranslated tags are flagged red in Japanese mode.
        let (label, foreground) = match (self.mode, translation) {
            (DisplayMode::Japanese, Some(jp)) => (jp.to_string(), background.readable_foreground()),
            (DisplayMode::Japanese, None) => (tag.clone(), Rgba::RED),
            (DisplayMode::English, _) => (tag.clone(), background.readable_foreground()),
        };

        TagView {
            tag,
            label,
            category,
            background,
            foreground,
            translated,
        }
    }

    /// Delete the first occurrence of `tag` from the selected image.
    ///
    /// Returns `false` without touching anything when the image has no tag
    /// file or does not carry the tag. On success the previous file contents
    /// become the undo snapshot.
    pub fn delete_tag(&mut self, tag: &str) -> Result<bool> {
        let idx = self.selected.ok_or(EditorError::NoSelection)?;
        let item = &self.items[idx];
        let Some(text_path) = item.live_text_path().map(Path::to_path_buf) else {
            return Ok(false);
        };

        let raw = std::fs::read_to_string(&text_path)?;
        let mut tags = tags::decode_for_edit(&raw);
        if !tags::remove_first(&mut tags, tag) {
            return Ok(false);
        }

        fsutil::write_atomic(&text_path, tags::encode(&tags).as_bytes())?;
        self.undo.arm(&text_path, raw);
        log::info!("Deleted '{}' from {}", tag, item.file_name());
        Ok(true)
    }

    /// Append `input` to the selected image's tags, creating the tag file if
    /// the image has none yet. Adding is not undoable and clears the undo snapshot.
    pub fn add_tag(&mut self, input: &str) -> Result<()> {
        let idx = self.selected.ok_or(EditorError::NoSelection)?;
        let tag = input.trim();
        if tag.is_empty() {
            return Err(EditorError::EmptyTag);
        }

        let item = &mut self.items[idx];
        let text_path = match &item.text_path {
            Some(path) => path.clone(),
            None => {
                let path = dataset::sidecar_path(&item.image_path);
                fsutil::write_atomic(&path, tag.as_bytes())?;
                log::info!("Created {} with '{}'", path.display(), tag);
                item.text_path = Some(path);
                self.undo.clear();
                return Ok(());
            }
        };

        let raw = if text_path.is_file() {
            std::fs::read_to_string(&text_path)?
        } else {
            String::new()
        };
        let mut tags = tags::decode(&raw);
        if tags::contains_ignore_case(&tags, tag) {
            return Err(EditorError::DuplicateTag(tag.to_string()));
        }

        tags.push(tag.to_string());
        fsutil::write_atomic(&text_path, tags::encode(&tags).as_bytes())?;
        self.undo.clear();
        log::info!("Added '{}' to {}", tag, item.file_name());
        Ok(())
    }

    /// Put back the tag file as it was before the last delete.
    pub fn undo(&mut self) -> Result<()> {
        match self.undo.restore() {
            Ok(path) => {
                log::info!("Undid last delete in {}", path.display());
                Ok(())
            }
            Err(err) => {
                if !matches!(err, EditorError::UndoUnavailable) {
                    log::error!("Undo failed: {}", err);
                }
                Err(err)
            }
        }
    }

    pub fn toggle_mode(&mut self) -> DisplayMode {
        self.mode = match self.mode {
            DisplayMode::Japanese => DisplayMode::English,
            DisplayMode::English => DisplayMode::Japanese,
        };
        self.mode
    }

    pub fn set_category(&mut self, tag: &str, category: &str) -> Result<()> {
        self.catalog.assign(tag, category);
        self.catalog.save(&self.settings.tag_category_map_path)?;
        log::info!("Set category of '{}' to '{}'", tag, category);
        Ok(())
    }

    pub fn translation_of(&self, tag: &str) -> Option<&str> {
        self.dictionary.lookup(tag)
    }

    /// Record `jp` as the translation of `tag` and reload the dictionary.
    pub fn fix_translation(&mut self, tag: &str, jp: &str) -> Result<()> {
        let jp = jp.trim();
        if jp.is_empty() {
            return Err(EditorError::EmptyTranslation);
        }
        let path = &self.settings.translate_csv_path;
        translation::upsert(path, tag, jp)?;
        self.dictionary = TranslationDictionary::load(path)?;
        Ok(())
    }

    /// Add the selected image's file name to the marked list.
    /// Returns `false` when it was already there.
    pub fn mark_selected(&mut self) -> Result<bool> {
        let item = self.selected_item().ok_or(EditorError::NoSelection)?;
        marked::mark(&self.settings.marked_file_path, &item.file_name())
    }

    /// Categories offered by the picker, in the order of the color resource.
    pub fn category_choices(&self) -> Vec<CategoryChoice> {
        self.catalog
            .colors()
            .iter()
            .map(|c| {
                let background = self
                    .catalog
                    .color_for_category(&c.name, PICKER_FALLBACK_COLOR);
                CategoryChoice {
                    name: c.name.clone(),
                    background,
                    foreground: background.readable_foreground(),
                }
            })
            .collect()
    }

    pub fn suggestions(&self, input: &str) -> Vec<String> {
        self.dictionary.suggest(input, SUGGESTION_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{self, DEFAULT_CATEGORY};
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        data: PathBuf,
        settings: Settings,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let config = root.path().join("config");
        let data = root.path().join("data");
        fs::create_dir(&config).unwrap();
        fs::create_dir(&data).unwrap();

        fs::write(config.join("translateMap.csv"), "# en,jp\nblue_eyes,青い目\n").unwrap();
        fs::write(
            config.join("categoryColorMap.json"),
            r##"{ "目の色": "#FF0000FF", "髪型": "#FFFFFF00", "一般": "" }"##,
        )
        .unwrap();
        fs::write(config.join("tagCategoryMap.json"), r#"{ "blue_eyes": "目の色" }"#).unwrap();

        fs::write(data.join("cat.png"), b"").unwrap();
        fs::write(data.join("cat.txt"), "blue_eyes, long_hair").unwrap();
        fs::write(data.join("dog.png"), b"").unwrap();

        let settings = Settings {
            translate_csv_path: config.join("translateMap.csv"),
            category_color_map_path: config.join("categoryColorMap.json"),
            tag_category_map_path: config.join("tagCategoryMap.json"),
            marked_file_path: config.join("marked.txt"),
            ..Settings::default()
        };

        Fixture {
            _root: root,
            data,
            settings,
        }
    }

    fn open(fx: &Fixture) -> Session {
        let (mut session, warnings) = Session::open(fx.settings.clone());
        assert!(warnings.is_empty(), "{:?}", warnings);
        session.open_folder(&fx.data).unwrap();
        session
    }

    fn position(session: &Session, name: &str) -> usize {
        session
            .items()
            .iter()
            .position(|item| item.file_name() == name)
            .unwrap()
    }

    #[test]
    fn scan_search_delete_undo_scenario() {
        let fx = fixture();
        let mut session = open(&fx);
        assert_eq!(session.items().len(), 2);
        assert_eq!(
            session.items().iter().filter(|i| i.text_path.is_some()).count(),
            1
        );

        assert_eq!(session.search(&["blue".to_string()]).unwrap(), 1);
        let cat = session.visible()[0];
        assert_eq!(session.items()[cat].file_name(), "cat.png");

        session.select(cat).unwrap();
        assert!(session.delete_tag("long_hair").unwrap());
        assert_eq!(fs::read_to_string(fx.data.join("cat.txt")).unwrap(), "blue_eyes");
        assert!(session.can_undo());

        session.undo().unwrap();
        assert_eq!(
            fs::read_to_string(fx.data.join("cat.txt")).unwrap(),
            "blue_eyes, long_hair"
        );
        assert!(matches!(session.undo(), Err(EditorError::UndoUnavailable)));
    }

    #[test]
    fn blank_search_shows_everything() {
        let fx = fixture();
        let mut session = open(&fx);
        session.search(&["blue".to_string()]).unwrap();

        let inputs = vec![" ".to_string(), String::new()];
        assert_eq!(session.search(&inputs).unwrap(), 2);
        assert_eq!(session.visible(), &[0, 1]);
    }

    #[test]
    fn search_needs_a_folder() {
        let fx = fixture();
        let (mut session, _) = Session::open(fx.settings.clone());
        assert!(matches!(
            session.search(&["blue".to_string()]),
            Err(EditorError::NoFolder)
        ));
    }

    #[test]
    fn tag_views_assign_default_category_and_persist() {
        let fx = fixture();
        let mut session = open(&fx);
        session.select(position(&session, "cat.png")).unwrap();

        let views = session.tag_views().unwrap();

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].tag, "blue_eyes");
        assert_eq!(views[0].label, "青い目");
        assert_eq!(views[0].background, Rgba::opaque(0, 0, 0xFF));
        assert_eq!(views[0].foreground, Rgba::WHITE);
        assert_eq!(views[1].tag, "long_hair");
        assert_eq!(views[1].category, DEFAULT_CATEGORY);
        assert!(!views[1].translated);
        assert_eq!(views[1].foreground, Rgba::RED);
        assert_eq!(views[1].background, DEFAULT_TAG_COLOR);

        let saved = category::load_assignments(&fx.settings.tag_category_map_path).unwrap();
        assert_eq!(saved.get("long_hair").map(String::as_str), Some(DEFAULT_CATEGORY));
    }

    #[test]
    fn english_mode_uses_brightness_for_untranslated_tags() {
        let fx = fixture();
        let mut session = open(&fx);
        session.select(position(&session, "cat.png")).unwrap();
        assert_eq!(session.toggle_mode(), DisplayMode::English);

        let views = session.tag_views().unwrap();
        assert_eq!(views[0].label, "blue_eyes");
        assert_eq!(views[1].label, "long_hair");
        assert_eq!(views[1].foreground, Rgba::WHITE);
    }

    #[test]
    fn tag_views_order_by_category_and_hide_separator() {
        let fx = fixture();
        fs::write(fx.data.join("cat.txt"), "smile, |||, ponytail, blue_eyes").unwrap();
        let mut session = open(&fx);
        session.select(position(&session, "cat.png")).unwrap();
        session.set_category("ponytail", "髪型").unwrap();

        let tags: Vec<_> = session
            .tag_views()
            .unwrap()
            .into_iter()
            .map(|v| v.tag)
            .collect();

        // 髪型 ranks before 目の色, smile falls back to the default category
        assert_eq!(tags, vec!["ponytail", "blue_eyes", "smile"]);
        let saved = category::load_assignments(&fx.settings.tag_category_map_path).unwrap();
        assert!(!saved.contains_key("|||"));
    }

    #[test]
    fn add_creates_sidecar_and_rejects_duplicates() {
        let fx = fixture();
        let mut session = open(&fx);
        let dog = position(&session, "dog.png");
        session.select(dog).unwrap();

        session.add_tag("  1girl ").unwrap();
        assert_eq!(fs::read_to_string(fx.data.join("dog.txt")).unwrap(), "1girl");
        assert_eq!(session.items()[dog].text_path, Some(fx.data.join("dog.txt")));

        session.add_tag("solo").unwrap();
        assert_eq!(
            fs::read_to_string(fx.data.join("dog.txt")).unwrap(),
            "1girl, solo"
        );

        assert!(matches!(
            session.add_tag("SOLO"),
            Err(EditorError::DuplicateTag(_))
        ));
        assert!(matches!(session.add_tag("   "), Err(EditorError::EmptyTag)));
        assert_eq!(
            fs::read_to_string(fx.data.join("dog.txt")).unwrap(),
            "1girl, solo"
        );
    }

    #[test]
    fn add_keeps_separator_in_storage() {
        let fx = fixture();
        fs::write(fx.data.join("cat.txt"), "a, |||, b").unwrap();
        let mut session = open(&fx);
        session.select(position(&session, "cat.png")).unwrap();

        session.add_tag("c").unwrap();

        assert_eq!(fs::read_to_string(fx.data.join("cat.txt")).unwrap(), "a, |||, b, c");
    }

    #[test]
    fn add_and_selection_change_discard_undo() {
        let fx = fixture();
        let mut session = open(&fx);
        let cat = position(&session, "cat.png");
        let dog = position(&session, "dog.png");

        session.select(cat).unwrap();
        session.delete_tag("long_hair").unwrap();
        session.add_tag("smile").unwrap();
        assert!(!session.can_undo());

        session.delete_tag("smile").unwrap();
        session.select(cat).unwrap();
        assert!(session.can_undo());
        session.select(dog).unwrap();
        assert!(!session.can_undo());
        assert!(matches!(session.undo(), Err(EditorError::UndoUnavailable)));
    }

    #[test]
    fn reopening_folder_discards_undo() {
        let fx = fixture();
        let mut session = open(&fx);
        session.select(position(&session, "cat.png")).unwrap();
        session.delete_tag("long_hair").unwrap();
        assert!(session.can_undo());

        session.open_folder(&fx.data).unwrap();
        assert!(!session.can_undo());
        assert!(matches!(session.undo(), Err(EditorError::UndoUnavailable)));
        assert_eq!(fs::read_to_string(fx.data.join("cat.txt")).unwrap(), "blue_eyes");
    }

    #[test]
    fn search_discards_undo() {
        let fx = fixture();
        let mut session = open(&fx);
        session.select(position(&session, "cat.png")).unwrap();
        session.delete_tag("long_hair").unwrap();
        assert!(session.can_undo());

        session.search(&["blue".to_string()]).unwrap();
        assert!(!session.can_undo());
        assert_eq!(session.selected(), None);
        assert!(matches!(session.undo(), Err(EditorError::UndoUnavailable)));
    }

    #[test]
    fn delete_without_sidecar_or_tag_is_a_no_op() {
        let fx = fixture();
        let mut session = open(&fx);

        assert!(matches!(session.delete_tag("x"), Err(EditorError::NoSelection)));

        session.select(position(&session, "dog.png")).unwrap();
        assert!(!session.delete_tag("blue_eyes").unwrap());

        session.select(position(&session, "cat.png")).unwrap();
        assert!(!session.delete_tag("missing").unwrap());
        assert!(!session.can_undo());
    }

    #[test]
    fn fix_translation_persists_and_reloads() {
        let fx = fixture();
        let mut session = open(&fx);

        session.fix_translation("long_hair", " 長髪 ").unwrap();
        assert_eq!(session.translation_of("long_hair"), Some("長髪"));
        assert!(matches!(
            session.fix_translation("long_hair", "  "),
            Err(EditorError::EmptyTranslation)
        ));

        let csv = fs::read_to_string(&fx.settings.translate_csv_path).unwrap();
        assert_eq!(csv, "# en,jp\nblue_eyes,青い目\nlong_hair,長髪\n");
    }

    #[test]
    fn mark_requires_selection_and_skips_duplicates() {
        let fx = fixture();
        let mut session = open(&fx);
        assert!(matches!(session.mark_selected(), Err(EditorError::NoSelection)));

        session.select(position(&session, "cat.png")).unwrap();
        assert!(session.mark_selected().unwrap());
        assert!(!session.mark_selected().unwrap());
        assert_eq!(
            fs::read_to_string(&fx.settings.marked_file_path).unwrap(),
            "cat.png\n"
        );
    }

    #[test]
    fn category_choices_follow_resource_order() {
        let fx = fixture();
        let session = open(&fx);

        let choices = session.category_choices();
        let names: Vec<_> = choices.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["目の色", "髪型", "一般"]);
        assert_eq!(choices[1].foreground, Rgba::BLACK);
        assert_eq!(choices[2].background, PICKER_FALLBACK_COLOR);
    }

    #[test]
    fn missing_resources_are_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            translate_csv_path: dir.path().join("none.csv"),
            category_color_map_path: dir.path().join("none1.json"),
            tag_category_map_path: dir.path().join("none2.json"),
            ..Settings::default()
        };

        let (session, warnings) = Session::open(settings);

        assert_eq!(warnings.len(), 3);
        assert!(warnings
            .iter()
            .all(|w| matches!(w, EditorError::MissingResource(_))));
        assert!(session.suggestions("hair").is_empty());
    }
}
