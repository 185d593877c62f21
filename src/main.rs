//! Main application logic and persistent user settings.

use dirs_next as dirs;
use eframe::{App, Frame, NativeOptions, egui};
use egui_extras::DatePickerButton;
use egui_plot::{Plot, Points};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use log::info;

mod plotting;
use plotting::{ScatterPoint, calorie_distance_scatter, point_color, scale_color};
mod store;
use store::{StoreError, WorkoutInput, WorkoutRecord, WorkoutStore};

fn default_plot_height() -> f32 {
    260.0
}

/// Persistent configuration for user preferences.
///
/// The values are serialized to a JSON file so choices like `dark_mode`
/// survive across application restarts. Missing fields default via
/// `#[serde(default)]` when loading an older configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Settings {
    dark_mode: bool,
    #[serde(default = "default_plot_height")]
    plot_height: f32,
}

impl Settings {
    const FILE: &'static str = "fittrack_settings.json";

    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(Self::FILE))
    }

    /// Load settings from the JSON configuration file, falling back to
    /// defaults when the file is missing or unreadable.
    fn load() -> Self {
        if let Some(path) = Self::path() {
            if let Ok(data) = std::fs::read_to_string(&path) {
                if let Ok(cfg) = serde_json::from_str(&data) {
                    return cfg;
                }
            }
        }
        Self::default()
    }

    /// Persist the current settings to disk.
    fn save(&self) {
        if let Some(path) = Self::path() {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Ok(data) = serde_json::to_string_pretty(self) {
                let _ = std::fs::write(path, data);
            }
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dark_mode: true,
            plot_height: default_plot_height(),
        }
    }
}

/// Where the workout database lives: the `FITTRACK_DB` environment variable
/// wins, then the platform data directory, then the working directory.
fn database_path() -> PathBuf {
    if let Some(path) = std::env::var_os("FITTRACK_DB") {
        return PathBuf::from(path);
    }
    dirs::data_dir()
        .map(|p| p.join("fittrack").join("fittrack.db"))
        .unwrap_or_else(|| PathBuf::from("fittrack.db"))
}

struct FitTrackApp {
    store: WorkoutStore,
    /// Read-only snapshot of the stored records, rebuilt after every
    /// mutation.
    records: Vec<WorkoutRecord>,
    /// Last computed scatter dataset, `None` until Submit is pressed.
    scatter: Option<Vec<ScatterPoint>>,
    form_date: NaiveDate,
    form_calories: String,
    form_distance: String,
    form_description: String,
    selected: Option<i64>,
    pending_delete: Option<i64>,
    pending_clear: bool,
    error: Option<String>,
    warning: Option<String>,
    warning_start: Option<Instant>,
    settings: Settings,
    settings_dirty: bool,
}

impl FitTrackApp {
    fn new(store: WorkoutStore) -> Self {
        let settings = Settings::load();
        let mut error = None;
        let records = match store.list_all() {
            Ok(records) => records,
            Err(err) => {
                error = Some(format!("Failed to load workouts: {err}"));
                Vec::new()
            }
        };
        info!("Loaded {} workout records", records.len());

        Self {
            store,
            records,
            scatter: None,
            form_date: Local::now().date_naive(),
            form_calories: String::new(),
            form_distance: String::new(),
            form_description: String::new(),
            selected: None,
            pending_delete: None,
            pending_clear: false,
            error,
            warning: None,
            warning_start: None,
            settings,
            settings_dirty: false,
        }
    }

    /// Rebuild the displayed snapshot from the store.
    fn reload(&mut self) {
        match self.store.list_all() {
            Ok(records) => {
                if let Some(id) = self.selected {
                    if !records.iter().any(|r| r.id == id) {
                        self.selected = None;
                    }
                }
                self.records = records;
            }
            Err(err) => self.report_error(format!("Failed to reload workouts: {err}")),
        }
    }

    fn report_error(&mut self, message: String) {
        log::error!("{message}");
        self.error = Some(message);
    }

    fn report_warning(&mut self, message: String) {
        log::warn!("{message}");
        self.warning = Some(message);
        self.warning_start = Some(Instant::now());
    }

    fn add_workout(&mut self) {
        let input = match WorkoutInput::from_form(
            self.form_date,
            &self.form_calories,
            &self.form_distance,
            &self.form_description,
        ) {
            Ok(input) => input,
            Err(err) => {
                self.report_warning(err.to_string());
                return;
            }
        };

        match self.store.insert(&input) {
            Ok(id) => {
                info!("Added workout record {id}");
                self.reset_form();
                self.reload();
            }
            Err(err @ StoreError::Validation(_)) => self.report_warning(err.to_string()),
            Err(err) => self.report_error(format!("Failed to add workout: {err}")),
        }
    }

    fn request_delete(&mut self) {
        match self.selected {
            Some(id) => self.pending_delete = Some(id),
            None => self.report_warning("Please select a row to delete".into()),
        }
    }

    fn delete_confirmed(&mut self, id: i64) {
        match self.store.delete(id) {
            Ok(()) => {
                info!("Deleted workout record {id}");
                self.selected = None;
                self.reload();
            }
            Err(err) => self.report_error(format!("Failed to delete workout: {err}")),
        }
    }

    fn clear_confirmed(&mut self) {
        match self.store.clear_all() {
            Ok(()) => {
                info!("Cleared all workout records");
                self.selected = None;
                self.scatter = None;
                self.reload();
            }
            Err(err) => self.report_error(format!("Failed to clear workouts: {err}")),
        }
    }

    /// Recompute the calories-versus-distance scatter from the stored set.
    fn submit_plot(&mut self) {
        let records = match self.store.list_all() {
            Ok(records) => records,
            Err(err) => {
                self.report_error(format!("Failed to read workouts: {err}"));
                return;
            }
        };

        match calorie_distance_scatter(&records) {
            Ok(points) => self.scatter = Some(points),
            Err(err) => self.report_warning(err.to_string()),
        }
    }

    fn reset_form(&mut self) {
        self.form_date = Local::now().date_naive();
        self.form_calories.clear();
        self.form_distance.clear();
        self.form_description.clear();
    }

    /// Blank the form and discard the computed plot.
    fn reset(&mut self) {
        self.reset_form();
        self.scatter = None;
    }

    fn entry_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("FitTrack");
        ui.add_space(8.0);

        ui.horizontal(|ui| {
            ui.label("Date:");
            ui.add(DatePickerButton::new(&mut self.form_date).id_source("entry_date"));
        });
        ui.horizontal(|ui| {
            ui.label("Calories:");
            ui.text_edit_singleline(&mut self.form_calories);
        });
        ui.horizontal(|ui| {
            ui.label("Distance:");
            ui.text_edit_singleline(&mut self.form_distance);
        });
        ui.horizontal(|ui| {
            ui.label("Description:");
            ui.text_edit_singleline(&mut self.form_description);
        });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("Add").clicked() {
                self.add_workout();
            }
            if ui.button("Delete").clicked() {
                self.request_delete();
            }
        });
        ui.horizontal(|ui| {
            if ui.button("Submit").clicked() {
                self.submit_plot();
            }
            if ui.button("Reset").clicked() {
                self.reset();
            }
            if ui.button("Clear").clicked() {
                self.pending_clear = true;
            }
        });

        ui.add_space(8.0);
        if ui
            .checkbox(&mut self.settings.dark_mode, "Dark Mode")
            .changed()
        {
            self.settings_dirty = true;
        }
    }

    fn scatter_plot(&self, ui: &mut egui::Ui, points: &[ScatterPoint]) {
        ui.heading("Calories burned vs Distance");
        ui.horizontal(|ui| {
            Plot::new("calorie_scatter")
                .height(self.settings.plot_height)
                .width((ui.available_width() - 110.0).max(200.0))
                .show(ui, |plot_ui| {
                    for p in points {
                        plot_ui.points(
                            Points::new(vec![[p.distance, p.calories]])
                                .radius((p.size as f32).sqrt())
                                .color(point_color(p.normalized)),
                        );
                    }
                });
            colorbar(ui, self.settings.plot_height);
        });
    }

    fn record_table(&mut self, ui: &mut egui::Ui) {
        let mut selected = self.selected;
        let row_height = ui.text_style_height(&egui::TextStyle::Body);
        egui_extras::TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .column(egui_extras::Column::auto())
            .column(egui_extras::Column::auto())
            .column(egui_extras::Column::auto())
            .column(egui_extras::Column::auto())
            .column(egui_extras::Column::remainder())
            .header(row_height, |mut header| {
                header.col(|ui| {
                    ui.strong("ID");
                });
                header.col(|ui| {
                    ui.strong("Date");
                });
                header.col(|ui| {
                    ui.strong("Calories");
                });
                header.col(|ui| {
                    ui.strong("Distance");
                });
                header.col(|ui| {
                    ui.strong("Description");
                });
            })
            .body(|mut body| {
                for r in &self.records {
                    body.row(row_height, |mut row| {
                        row.col(|ui| {
                            let is_selected = selected == Some(r.id);
                            if ui.selectable_label(is_selected, r.id.to_string()).clicked() {
                                selected = if is_selected { None } else { Some(r.id) };
                            }
                        });
                        row.col(|ui| {
                            ui.label(r.date.format("%Y-%m-%d").to_string());
                        });
                        row.col(|ui| {
                            ui.label(r.calories.to_string());
                        });
                        row.col(|ui| {
                            ui.label(format!("{:.1}", r.distance));
                        });
                        row.col(|ui| {
                            ui.label(&r.description);
                        });
                    });
                }
            });
        self.selected = selected;
    }
}

/// Vertical gradient strip mirroring the marker color scale.
fn colorbar(ui: &mut egui::Ui, height: f32) {
    ui.vertical(|ui| {
        ui.set_width(100.0);
        ui.label("1.0");
        let (rect, _) =
            ui.allocate_exact_size(egui::vec2(16.0, (height - 70.0).max(40.0)), egui::Sense::hover());
        let painter = ui.painter();
        let steps = 32;
        for i in 0..steps {
            let t0 = i as f32 / steps as f32;
            let t1 = (i + 1) as f32 / steps as f32;
            let seg = egui::Rect::from_min_max(
                egui::pos2(rect.left(), rect.bottom() - t1 * rect.height()),
                egui::pos2(rect.right(), rect.bottom() - t0 * rect.height()),
            );
            painter.rect_filled(seg, 0.0, scale_color(t0 as f64));
        }
        ui.label("0.0");
        ui.label("Normalized Calories");
    });
}

impl App for FitTrackApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        ctx.set_visuals(if self.settings.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });

        egui::SidePanel::left("entry_panel").show(ctx, |ui| {
            self.entry_panel(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(points) = &self.scatter {
                self.scatter_plot(ui, points);
                ui.separator();
            }
            self.record_table(ui);
        });

        if let Some(id) = self.pending_delete {
            let mut confirmed = false;
            let mut cancelled = false;
            egui::Window::new("Delete Workout")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label("Are you sure you want to delete this workout?");
                    ui.horizontal(|ui| {
                        if ui.button("Yes").clicked() {
                            confirmed = true;
                        }
                        if ui.button("No").clicked() {
                            cancelled = true;
                        }
                    });
                });
            if confirmed {
                self.pending_delete = None;
                self.delete_confirmed(id);
            } else if cancelled {
                self.pending_delete = None;
            }
        }

        if self.pending_clear {
            let mut confirmed = false;
            let mut cancelled = false;
            egui::Window::new("Clear Workouts")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label("Remove every workout record? This cannot be undone.");
                    ui.horizontal(|ui| {
                        if ui.button("Yes").clicked() {
                            confirmed = true;
                        }
                        if ui.button("No").clicked() {
                            cancelled = true;
                        }
                    });
                });
            if confirmed {
                self.pending_clear = false;
                self.clear_confirmed();
            } else if cancelled {
                self.pending_clear = false;
            }
        }

        if let Some(message) = self.error.clone() {
            let mut open = true;
            let mut dismissed = false;
            egui::Window::new("FitTrack")
                .open(&mut open)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(&message);
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
            if !open || dismissed {
                self.error = None;
            }
        }

        if let Some(start) = self.warning_start {
            if start.elapsed() < Duration::from_secs(3) {
                if let Some(ref message) = self.warning {
                    egui::Area::new(egui::Id::new("warning_toast"))
                        .anchor(egui::Align2::RIGHT_TOP, [-10.0, 10.0])
                        .show(ctx, |ui| {
                            ui.label(message);
                        });
                }
            } else {
                self.warning_start = None;
                self.warning = None;
            }
        }

        if self.settings_dirty {
            self.settings.save();
            self.settings_dirty = false;
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.save();
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();

    let path = database_path();
    info!("Opening workout database at {}", path.display());
    let store = match WorkoutStore::open(&path) {
        Ok(store) => store,
        Err(err) => {
            log::error!("Database error: {err}");
            let message = format!("Database Error: {err}");
            rfd::MessageDialog::new()
                .set_level(rfd::MessageLevel::Error)
                .set_title("FitTrack")
                .set_description(message.as_str())
                .show();
            std::process::exit(2);
        }
    };

    let options = NativeOptions::default();
    eframe::run_native(
        "FitTrack",
        options,
        Box::new(|_cc| Box::new(FitTrackApp::new(store))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn settings_roundtrip() {
        let s = Settings {
            dark_mode: false,
            plot_height: 300.0,
        };

        let json = serde_json::to_string(&s).unwrap();
        let loaded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, loaded);
    }

    #[test]
    fn settings_missing_fields_use_defaults() {
        let loaded: Settings = serde_json::from_str(r#"{"dark_mode":false}"#).unwrap();
        assert_eq!(loaded.plot_height, default_plot_height());
    }

    #[test]
    fn settings_persistence() {
        use std::env;

        let _guard = ENV_MUTEX.lock().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let prev_config = env::var_os("XDG_CONFIG_HOME");
        unsafe {
            env::set_var("XDG_CONFIG_HOME", dir.path());
        }

        let s = Settings {
            dark_mode: false,
            plot_height: 300.0,
        };
        s.save();
        let loaded = Settings::load();
        assert_eq!(s, loaded);

        if let Some(val) = prev_config {
            unsafe {
                env::set_var("XDG_CONFIG_HOME", val);
            }
        } else {
            unsafe {
                env::remove_var("XDG_CONFIG_HOME");
            }
        }
    }

    #[test]
    fn database_path_env_override() {
        use std::env;

        let _guard = ENV_MUTEX.lock().unwrap();

        let prev = env::var_os("FITTRACK_DB");
        unsafe {
            env::set_var("FITTRACK_DB", "/tmp/fittrack-test.db");
        }
        assert_eq!(database_path(), PathBuf::from("/tmp/fittrack-test.db"));

        if let Some(val) = prev {
            unsafe {
                env::set_var("FITTRACK_DB", val);
            }
        } else {
            unsafe {
                env::remove_var("FITTRACK_DB");
            }
        }
    }

    #[test]
    fn insert_list_and_plot_end_to_end() {
        let store = WorkoutStore::open_in_memory().unwrap();
        let first = WorkoutInput::from_form(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "300",
            "5.0",
            "run",
        )
        .unwrap();
        let second = WorkoutInput::from_form(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            "300",
            "5.0",
            "run",
        )
        .unwrap();
        store.insert(&first).unwrap();
        store.insert(&second).unwrap();

        let records = store.list_all().unwrap();
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());

        let points = calorie_distance_scatter(&records).unwrap();
        assert_eq!(points.len(), 2);
        for p in &points {
            assert_eq!(p.normalized, 1.0);
            assert_eq!(p.size, 100.0);
        }
    }
}
