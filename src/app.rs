use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use eframe::egui;
use rfd::FileDialog;

use crate::color::Rgba;
use crate::errors::EditorError;
use crate::session::{DisplayMode, Session, TagView};
use crate::thumbnail::{self, ThumbnailLoader, ThumbnailMessage, PREVIEW_SIZE, THUMBNAIL_SIZE};

const SEARCH_FIELDS: usize = 4;
const ADD_FIELDS: usize = 4;
const FEEDBACK_TIMEOUT: Duration = Duration::from_secs(5);

const FONT_CANDIDATES: [&str; 4] = [
    "C:/Windows/Fonts/meiryo.ttc",
    "C:/Windows/Fonts/msgothic.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/System/Library/Fonts/ヒラギノ角ゴシック W3.ttc",
];

struct Feedback {
    text: String,
    is_error: bool,
    shown_at: Instant,
}

enum Dialog {
    Category { tag: String },
    Translation { tag: String, input: String, focused: bool },
}

/// Collected while drawing, applied once the panels are done.
enum UiAction {
    Select(usize),
    DeleteTag(String),
    PickCategory(String),
    FixTranslation(String),
    AddTag(usize),
    Suggest(usize, String),
    Search,
    ShowAll,
}

pub struct TagEditorApp {
    session: Session,
    thumbnails: HashMap<usize, egui::TextureHandle>,
    loader: Option<ThumbnailLoader>,
    preview: Option<egui::TextureHandle>,
    tag_views: Vec<TagView>,
    search_inputs: [String; SEARCH_FIELDS],
    add_inputs: [String; ADD_FIELDS],
    dialog: Option<Dialog>,
    feedback: Option<Feedback>,
}

impl TagEditorApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        session: Session,
        warnings: Vec<EditorError>,
        font_path: Option<PathBuf>,
    ) -> Self {
        setup_fonts(&cc.egui_ctx, font_path.as_deref());

        let mut app = Self {
            session,
            thumbnails: HashMap::new(),
            loader: None,
            preview: None,
            tag_views: Vec::new(),
            search_inputs: Default::default(),
            add_inputs: Default::default(),
            dialog: None,
            feedback: None,
        };
        if !warnings.is_empty() {
            let text = warnings
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            app.show_error(text);
        }
        app
    }

    fn show_info(&mut self, text: impl Into<String>) {
        self.feedback = Some(Feedback {
            text: text.into(),
            is_error: false,
            shown_at: Instant::now(),
        });
    }

    fn show_error(&mut self, text: impl Into<String>) {
        self.feedback = Some(Feedback {
            text: text.into(),
            is_error: true,
            shown_at: Instant::now(),
        });
    }

    fn open_folder(&mut self) {
        let Some(dir) = FileDialog::new()
            .set_title("画像とTXTファイルが入ったフォルダを選択してください")
            .pick_folder()
        else {
            return;
        };

        match self.session.open_folder(&dir) {
            Ok(count) => {
                self.thumbnails.clear();
                self.preview = None;
                self.tag_views.clear();
                self.start_thumbnails();
                self.show_info(format!("{} images loaded", count));
            }
            Err(err) => self.show_error(err.to_string()),
        }
    }

    fn start_thumbnails(&mut self) {
        let jobs: Vec<(usize, PathBuf)> = self
            .session
            .items()
            .iter()
            .enumerate()
            .map(|(idx, item)| (idx, item.image_path.clone()))
            .collect();
        log::info!("Starting thumbnail loading for {} images...", jobs.len());
        // Replacing the loader cancels the previous folder's remaining work.
        self.loader = Some(ThumbnailLoader::spawn(jobs, THUMBNAIL_SIZE));
    }

    fn receive_thumbnails(&mut self, ctx: &egui::Context) {
        let Some(loader) = &self.loader else {
            return;
        };
        // Checked before draining: everything counted has already been sent.
        let finished = loader.is_finished();
        for message in loader.drain() {
            match message {
                ThumbnailMessage::Decoded {
                    idx,
                    width,
                    height,
                    pixels,
                } => {
                    let color_image = egui::ColorImage::from_rgba_unmultiplied(
                        [width as _, height as _],
                        &pixels,
                    );
                    let texture = ctx.load_texture(
                        format!("thumb_{}", idx),
                        color_image,
                        egui::TextureOptions::default(),
                    );
                    self.thumbnails.insert(idx, texture);
                }
                ThumbnailMessage::Failed { idx, error } => {
                    log::debug!("No thumbnail for item {}: {}", idx, error);
                }
            }
        }
        if finished {
            self.loader = None;
        } else {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }

    fn load_preview(&mut self, ctx: &egui::Context, path: &Path) {
        self.preview = match thumbnail::load_preview(path, PREVIEW_SIZE) {
            Ok(rgba) => {
                let size = [rgba.width() as _, rgba.height() as _];
                let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
                Some(ctx.load_texture("preview", color_image, egui::TextureOptions::default()))
            }
            Err(err) => {
                log::warn!("Preview failed for {}: {}", path.display(), err);
                None
            }
        };
    }

    fn refresh_tags(&mut self) {
        match self.session.tag_views() {
            Ok(views) => self.tag_views = views,
            Err(err) => {
                self.tag_views.clear();
                self.show_error(err.to_string());
            }
        }
    }

    fn select(&mut self, ctx: &egui::Context, idx: usize) {
        if let Err(err) = self.session.select(idx) {
            self.show_error(err.to_string());
            return;
        }
        if let Some(path) = self.session.selected_item().map(|item| item.image_path.clone()) {
            self.load_preview(ctx, &path);
        }
        self.refresh_tags();
    }

    fn search(&mut self) {
        match self.session.search(&self.search_inputs) {
            Ok(count) => {
                self.preview = None;
                self.tag_views.clear();
                self.show_info(format!("{} images match", count));
            }
            Err(err) => self.show_error(err.to_string()),
        }
    }

    fn show_all(&mut self) {
        for input in &mut self.search_inputs {
            input.clear();
        }
        self.search();
    }

    fn add_tag(&mut self, field: usize) {
        let input = std::mem::take(&mut self.add_inputs[field]);
        match self.session.add_tag(&input) {
            Ok(()) => self.refresh_tags(),
            Err(EditorError::EmptyTag) => {}
            Err(err) => self.show_error(err.to_string()),
        }
    }

    fn delete_tag(&mut self, tag: &str) {
        match self.session.delete_tag(tag) {
            Ok(true) => self.refresh_tags(),
            Ok(false) => {}
            Err(err) => self.show_error(err.to_string()),
        }
    }

    fn undo(&mut self) {
        let result = self.session.undo();
        self.refresh_tags();
        if let Err(err) = result {
            self.show_error(err.to_string());
        }
    }

    fn mark(&mut self) {
        match self.session.mark_selected() {
            Ok(true) => self.show_info("Marked"),
            Ok(false) => self.show_info("Already marked"),
            Err(err) => self.show_error(err.to_string()),
        }
    }

    fn toggle_language(&mut self) {
        self.session.toggle_mode();
        if self.session.selected().is_some() {
            self.refresh_tags();
        }
    }

    fn apply_category(&mut self, tag: &str, category: &str) {
        if let Err(err) = self.session.set_category(tag, category) {
            self.show_error(err.to_string());
        }
        self.refresh_tags();
    }

    fn apply_translation(&mut self, tag: &str, jp: &str) {
        match self.session.fix_translation(tag, jp) {
            Ok(()) => self.refresh_tags(),
            Err(err) => self.show_error(err.to_string()),
        }
    }

    fn apply(&mut self, ctx: &egui::Context, action: UiAction) {
        match action {
            UiAction::Select(idx) => self.select(ctx, idx),
            UiAction::DeleteTag(tag) => self.delete_tag(&tag),
            UiAction::PickCategory(tag) => self.dialog = Some(Dialog::Category { tag }),
            UiAction::FixTranslation(tag) => {
                let input = self.session.translation_of(&tag).unwrap_or_default().to_string();
                self.dialog = Some(Dialog::Translation {
                    tag,
                    input,
                    focused: false,
                });
            }
            UiAction::AddTag(field) => self.add_tag(field),
            UiAction::Suggest(field, tag) => self.add_inputs[field] = tag,
            UiAction::Search => self.search(),
            UiAction::ShowAll => self.show_all(),
        }
    }

    fn top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("フォルダを開く").clicked() {
                    self.open_folder();
                }
                if let Some(dir) = self.session.folder() {
                    ui.label(dir.display().to_string());
                }

                ui.separator();
                let language = match self.session.mode() {
                    DisplayMode::Japanese => "日本語 → English",
                    DisplayMode::English => "English → 日本語",
                };
                if ui.button(language).clicked() {
                    self.toggle_language();
                }
                if ui
                    .add_enabled(self.session.can_undo(), egui::Button::new("元に戻す"))
                    .clicked()
                {
                    self.undo();
                }
                if ui.button("マーク").clicked() {
                    self.mark();
                }
            });

            if let Some(feedback) = &self.feedback {
                let color = if feedback.is_error {
                    egui::Color32::LIGHT_RED
                } else {
                    egui::Color32::GREEN
                };
                ui.colored_label(color, &feedback.text);
            }

            if let Some(loader) = &self.loader {
                ui.add_space(4.0);
                ui.add(
                    egui::ProgressBar::new(loader.progress())
                        .show_percentage()
                        .desired_width(ui.available_width()),
                );
            }
        });
    }

    fn thumbnail_panel(&mut self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        egui::SidePanel::left("thumbnail_panel")
            .resizable(true)
            .default_width(480.0)
            .show(ctx, |ui| {
                ui.horizontal_wrapped(|ui| {
                    for input in self.search_inputs.iter_mut() {
                        let response = ui.add(
                            egui::TextEdit::singleline(input)
                                .hint_text("検索")
                                .desired_width(90.0),
                        );
                        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                            actions.push(UiAction::Search);
                        }
                    }
                });
                ui.horizontal(|ui| {
                    if ui.button("検索").clicked() {
                        actions.push(UiAction::Search);
                    }
                    if ui.button("全件表示").clicked() {
                        actions.push(UiAction::ShowAll);
                    }
                    ui.label(format!(
                        "{}/{}",
                        self.session.visible().len(),
                        self.session.items().len()
                    ));
                });
                ui.separator();

                let size = egui::vec2(THUMBNAIL_SIZE as f32, THUMBNAIL_SIZE as f32);
                egui::ScrollArea::vertical()
                    .id_salt("thumbnails")
                    .show(ui, |ui| {
                        ui.horizontal_wrapped(|ui| {
                            for &idx in self.session.visible() {
                                let selected = self.session.selected() == Some(idx);
                                let response = match self.thumbnails.get(&idx) {
                                    Some(texture) => ui.add(
                                        egui::ImageButton::new((texture.id(), size))
                                            .selected(selected),
                                    ),
                                    None => {
                                        let name = self.session.items()[idx].file_name();
                                        ui.add_sized(
                                            size,
                                            egui::Button::new(name).selected(selected),
                                        )
                                    }
                                };
                                if response.clicked() {
                                    actions.push(UiAction::Select(idx));
                                }
                            }
                        });
                    });
            });
    }

    fn tag_panel(&mut self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(item) = self.session.selected_item() else {
                ui.centered_and_justified(|ui| {
                    ui.label("画像を選択してください");
                });
                return;
            };
            ui.heading(item.file_name());

            if let Some(texture) = &self.preview {
                let max = egui::vec2(ui.available_width(), ui.available_height() * 0.5);
                ui.add(egui::Image::new((texture.id(), texture.size_vec2())).max_size(max));
            }
            ui.separator();

            egui::ScrollArea::vertical()
                .id_salt("tags")
                .max_height(ui.available_height() * 0.6)
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        for view in &self.tag_views {
                            let button = egui::Button::new(
                                egui::RichText::new(&view.label).color(to_color32(view.foreground)),
                            )
                            .fill(to_color32(view.background));
                            let hover = if view.translated {
                                format!("{} [{}]", view.tag, view.category)
                            } else {
                                format!("{} [{}] (未翻訳)", view.tag, view.category)
                            };
                            let response = ui.add(button).on_hover_text(hover);
                            if response.clicked() {
                                actions.push(UiAction::DeleteTag(view.tag.clone()));
                            }
                            response.context_menu(|ui| {
                                if ui.button("カテゴリ設定").clicked() {
                                    actions.push(UiAction::PickCategory(view.tag.clone()));
                                    ui.close_menu();
                                }
                                if ui.button("翻訳修正").clicked() {
                                    actions.push(UiAction::FixTranslation(view.tag.clone()));
                                    ui.close_menu();
                                }
                            });
                        }
                    });
                });
            ui.separator();

            for (field, input) in self.add_inputs.iter_mut().enumerate() {
                ui.horizontal(|ui| {
                    let response = ui.add(
                        egui::TextEdit::singleline(input)
                            .hint_text("タグを追加")
                            .desired_width(240.0),
                    );
                    if ui.button("追加").clicked()
                        || (response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)))
                    {
                        actions.push(UiAction::AddTag(field));
                    }
                    if response.has_focus() {
                        for suggestion in self.session.suggestions(input) {
                            if ui.small_button(&suggestion).clicked() {
                                actions.push(UiAction::Suggest(field, suggestion));
                            }
                        }
                    }
                });
            }
        });
    }

    fn dialog_window(&mut self, ctx: &egui::Context) {
        let Some(mut dialog) = self.dialog.take() else {
            return;
        };
        let mut open = true;

        match &mut dialog {
            Dialog::Category { tag } => {
                let mut chosen = None;
                let choices = self.session.category_choices();
                egui::Window::new("カテゴリ設定")
                    .collapsible(false)
                    .resizable(false)
                    .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                    .open(&mut open)
                    .show(ctx, |ui| {
                        ui.label(tag.as_str());
                        ui.horizontal_wrapped(|ui| {
                            for choice in &choices {
                                let button = egui::Button::new(
                                    egui::RichText::new(&choice.name)
                                        .color(to_color32(choice.foreground)),
                                )
                                .fill(to_color32(choice.background))
                                .min_size(egui::vec2(80.0, 40.0));
                                if ui.add(button).clicked() {
                                    chosen = Some(choice.name.clone());
                                }
                            }
                        });
                    });
                if let Some(category) = chosen {
                    let tag = tag.clone();
                    self.apply_category(&tag, &category);
                    open = false;
                }
            }
            Dialog::Translation {
                tag,
                input,
                focused,
            } => {
                let mut submitted = false;
                egui::Window::new("翻訳修正")
                    .collapsible(false)
                    .resizable(false)
                    .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                    .open(&mut open)
                    .show(ctx, |ui| {
                        ui.label(tag.as_str());
                        let response = ui.text_edit_singleline(input);
                        if !*focused {
                            response.request_focus();
                            *focused = true;
                        }
                        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                            submitted = true;
                        }
                    });
                if submitted {
                    let (tag, jp) = (tag.clone(), input.clone());
                    self.apply_translation(&tag, &jp);
                    open = false;
                }
            }
        }

        if open {
            self.dialog = Some(dialog);
        }
    }
}

impl eframe::App for TagEditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.receive_thumbnails(ctx);

        if self
            .feedback
            .as_ref()
            .is_some_and(|f| f.shown_at.elapsed() > FEEDBACK_TIMEOUT)
        {
            self.feedback = None;
        }

        let mut actions = Vec::new();
        self.top_panel(ctx);
        self.thumbnail_panel(ctx, &mut actions);
        self.tag_panel(ctx, &mut actions);
        self.dialog_window(ctx);

        for action in actions {
            self.apply(ctx, action);
        }
    }
}

fn to_color32(color: Rgba) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

/// Put a font with Japanese glyphs in front of egui's defaults.
fn setup_fonts(ctx: &egui::Context, font_path: Option<&Path>) {
    let candidates = font_path
        .map(Path::to_path_buf)
        .into_iter()
        .chain(FONT_CANDIDATES.iter().map(PathBuf::from));

    for path in candidates {
        let Ok(font_data) = std::fs::read(&path) else {
            continue;
        };
        let mut fonts = egui::FontDefinitions::default();
        fonts
            .font_data
            .insert("jp_font".to_owned(), egui::FontData::from_owned(font_data));
        for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
            if let Some(names) = fonts.families.get_mut(&family) {
                names.insert(0, "jp_font".to_owned());
            }
        }
        ctx.set_fonts(fonts);
        log::info!("Using font {}", path.display());
        return;
    }
    log::warn!("No Japanese font found; translated labels may not render");
}
