use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use eframe::egui::{self, Color32, RichText};
use hashbrown::HashMap;
use log::{error, info, warn};

use segtool_inference::engine::inference_engine::ExecutionProvider;
use segtool_inference::inference::sam::image_inference::SamImageSession;
use segtool_volume::labels::{self, LABELS};
use segtool_volume::render::{gray_to_rgb, normalize_to_u8};
use segtool_volume::session::BoxAnnotation;
use segtool_volume::{export, NiftiVolume, Side, StudyState};

mod canvas;
mod panel;

use crate::worker::{self, SamJob, SamJobResult};
use panel::{ImagePanel, PanelEvent};

pub struct SegToolApp {
    study: StudyState,
    left_panel: ImagePanel,
    right_panel: ImagePanel,
    colors: HashMap<u8, (u8, u8, u8)>,
    selected_label: u8,

    model_dir: Option<PathBuf>,
    executor: ExecutionProvider,
    sam: Option<Arc<SamImageSession>>,
    sam_busy: bool,

    status: String,
    results_tx: Sender<SamJobResult>,
    results_rx: Receiver<SamJobResult>,
}

impl SegToolApp {
    pub fn new(
        model_dir: Option<PathBuf>,
        executor: ExecutionProvider,
        left: Option<PathBuf>,
        right: Option<PathBuf>,
    ) -> Self {
        let (results_tx, results_rx) = channel();
        let mut app = SegToolApp {
            study: StudyState::default(),
            left_panel: ImagePanel::new(Side::Left, "Left (X-ray)"),
            right_panel: ImagePanel::new(Side::Right, "Right (MRI)"),
            colors: labels::color_table(),
            selected_label: 1,
            model_dir,
            executor,
            sam: None,
            sam_busy: false,
            status: String::new(),
            results_tx,
            results_rx,
        };

        if let Some(path) = left {
            app.load_volume(Side::Left, &path);
        }
        if let Some(path) = right {
            app.load_volume(Side::Right, &path);
        }
        if app.model_dir.is_some() {
            app.load_sam();
        }
        app
    }

    fn panel_mut(&mut self, side: Side) -> &mut ImagePanel {
        match side {
            Side::Left => &mut self.left_panel,
            Side::Right => &mut self.right_panel,
        }
    }

    fn set_status(&mut self, message: String) {
        info!("{message}");
        self.status = message;
    }

    // -------------------- loading --------------------

    fn pick_volume(&mut self, side: Side) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("NIfTI", &["nii", "gz"])
            .pick_file()
        else {
            return;
        };
        self.load_volume(side, &path);
    }

    fn load_volume(&mut self, side: Side, path: &Path) {
        match NiftiVolume::open(path) {
            Ok(volume) => {
                let state = self.study.side_mut(side);
                state.volume = Some(volume);
                state.reset_annotations();
                self.panel_mut(side).volume_loaded();
                self.set_status(format!("Loaded {}: {}", side.as_str(), path.display()));
            }
            Err(e) => {
                error!("load failed: {e:#}");
                self.set_status(format!("Load failed: {e:#}"));
            }
        }
    }

    fn load_sam(&mut self) {
        let Some(dir) = self.model_dir.clone() else {
            self.set_status("Select a SAM model directory first.".to_owned());
            return;
        };

        let mut executor = self.executor;
        let session = SamImageSession::new(&dir, executor).or_else(|e| {
            if executor == ExecutionProvider::Cpu {
                Err(e)
            } else {
                // CUDA provider unavailable on this machine; retry on CPU
                warn!("{} unavailable ({e:#}); falling back to cpu", executor.describe());
                executor = ExecutionProvider::Cpu;
                SamImageSession::new(&dir, executor)
            }
        });
        match session {
            Ok(session) => {
                self.executor = executor;
                self.sam = Some(Arc::new(session));
                self.set_status(format!("SAM loaded ({}).", executor.describe()));
            }
            Err(e) => {
                error!("SAM load failed: {e:#}");
                self.sam = None;
                self.set_status(format!("SAM load failed: {e:#}"));
            }
        }
    }

    // -------------------- annotation flow --------------------

    fn on_box_drawn(&mut self, ctx: &egui::Context, side: Side, event: PanelEvent) {
        let Some(spec) = labels::by_value(self.selected_label) else {
            return;
        };

        let prepared = {
            let state = self.study.side_mut(side);
            let Some(volume) = &state.volume else {
                return;
            };

            let slice = volume.display_slice(event.slice_index, event.orientation);
            let base = normalize_to_u8(slice.view());
            let shape = base.dim();
            let rgb = gray_to_rgb(&base);

            state.record_box(BoxAnnotation {
                side,
                slice_index: event.slice_index,
                orientation: event.orientation,
                label: spec.value,
                color: spec.color_name.to_owned(),
                box_xyxy: event.drawn.as_xyxy(),
            });
            (rgb, shape)
        };

        let Some(sam) = self.sam.clone() else {
            self.set_status("Box recorded, but SAM not ready.".to_owned());
            return;
        };
        if self.sam_busy {
            self.set_status("SAM busy; box recorded but not executed.".to_owned());
            return;
        }

        let (rgb, shape) = prepared;
        let job = SamJob {
            side,
            slice_index: event.slice_index,
            orientation: event.orientation,
            label: spec.value,
            shape,
        };
        self.sam_busy = true;
        self.set_status(format!(
            "Running SAM on {} slice {} ({}) ...",
            side.as_str(),
            event.slice_index,
            event.orientation.label()
        ));
        worker::spawn(
            sam,
            rgb,
            event.drawn.as_xyxy(),
            job,
            self.results_tx.clone(),
            ctx.clone(),
        );
    }

    fn drain_results(&mut self) {
        while let Ok(result) = self.results_rx.try_recv() {
            self.sam_busy = false;
            let job = result.job;
            match result.outcome {
                Ok(mask) => {
                    let applied = self.study.side_mut(job.side).apply_display_mask(
                        job.slice_index,
                        &mask,
                        job.label,
                        job.orientation,
                    );
                    match applied {
                        Ok(()) => {
                            self.panel_mut(job.side).mark_dirty();
                            let label = labels::by_value(job.label)
                                .map(|s| s.name)
                                .unwrap_or("?");
                            self.set_status(format!(
                                "SAM done: {} slice {} ({}), label {}",
                                job.side.as_str(),
                                job.slice_index,
                                job.orientation.label(),
                                label
                            ));
                        }
                        Err(e) => {
                            error!("applying mask failed: {e:#}");
                            self.set_status(format!("Applying mask failed: {e:#}"));
                        }
                    }
                }
                Err(e) => {
                    error!("SAM error: {e:#}");
                    self.set_status(format!("SAM error: {e:#}"));
                }
            }
        }
    }

    // -------------------- actions --------------------

    fn undo(&mut self, side: Side) {
        let state = self.study.side_mut(side);
        if state.volume.is_none() {
            return;
        }
        let message = if state.undo_last_box().is_some() {
            format!("Removed last box record on {} (mask unchanged).", side.as_str())
        } else {
            format!("No boxes to undo on {}.", side.as_str())
        };
        self.set_status(message);
    }

    fn clear(&mut self, side: Side) {
        let state = self.study.side_mut(side);
        if state.volume.is_none() {
            return;
        }
        state.reset_annotations();
        self.panel_mut(side).mark_dirty();
        self.set_status(format!("Cleared {}.", side.as_str()));
    }

    fn save_all(&mut self) {
        let Some(out_dir) = rfd::FileDialog::new().pick_folder() else {
            return;
        };
        match export::export_study(&mut self.study, &out_dir) {
            Ok(written) if written.is_empty() => {
                self.set_status("Nothing to save; load a volume first.".to_owned());
            }
            Ok(_) => self.set_status(format!("Saved outputs to: {}", out_dir.display())),
            Err(e) => {
                error!("save failed: {e:#}");
                self.set_status(format!("Save failed: {e:#}"));
            }
        }
    }

    // -------------------- UI --------------------

    fn tools_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("segtool");
        ui.separator();

        ui.strong("Load NIfTI");
        if ui.button("Load Left (X-ray) .nii/.nii.gz").clicked() {
            self.pick_volume(Side::Left);
        }
        if ui.button("Load Right (MRI) .nii/.nii.gz").clicked() {
            self.pick_volume(Side::Right);
        }
        ui.separator();

        ui.strong("Label");
        egui::ScrollArea::vertical()
            .id_salt("label-palette")
            .max_height(220.0)
            .show(ui, |ui| {
                egui::Grid::new("label-grid").num_columns(2).show(ui, |ui| {
                    for (i, spec) in LABELS.iter().enumerate() {
                        let selected = self.selected_label == spec.value;
                        let text = RichText::new(spec.name)
                            .color(Color32::from_rgb(spec.rgb.0, spec.rgb.1, spec.rgb.2))
                            .strong();
                        if ui.selectable_label(selected, text).clicked() {
                            self.selected_label = spec.value;
                        }
                        if i % 2 == 1 {
                            ui.end_row();
                        }
                    }
                });
            });
        ui.separator();

        ui.strong("SAM");
        if ui.button("Select model directory").clicked() {
            if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                self.model_dir = Some(dir);
            }
        }
        match &self.model_dir {
            Some(dir) => ui.label(RichText::new(format!("model: {}", dir.display())).small()),
            None => ui.label(RichText::new("model: (none)").small().italics()),
        };
        ui.horizontal(|ui| {
            ui.label("device:");
            let cuda = match self.executor {
                ExecutionProvider::Cuda(id) => ExecutionProvider::Cuda(id),
                ExecutionProvider::Cpu => ExecutionProvider::Cuda(0),
            };
            egui::ComboBox::from_id_salt("device")
                .selected_text(self.executor.describe())
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.executor, cuda, cuda.describe());
                    ui.selectable_value(&mut self.executor, ExecutionProvider::Cpu, "cpu");
                });
        });
        if ui.button("Load SAM").clicked() {
            self.load_sam();
        }
        ui.separator();

        ui.strong("Actions");
        if ui.button("Undo last box record (Left)").clicked() {
            self.undo(Side::Left);
        }
        if ui.button("Undo last box record (Right)").clicked() {
            self.undo(Side::Right);
        }
        if ui.button("Clear Left mask/boxes").clicked() {
            self.clear(Side::Left);
        }
        if ui.button("Clear Right mask/boxes").clicked() {
            self.clear(Side::Right);
        }
        ui.add_space(8.0);
        if ui.button("Save (mask .nii.gz + boxes .json)").clicked() {
            self.save_all();
        }
        ui.separator();

        ui.strong("Status");
        ui.label(format!("SAM ready: {}", self.sam.is_some()));
        if self.sam.is_some() {
            ui.label(format!("SAM device: {}", self.executor.describe()));
        }
        ui.label(format!("Busy: {}", self.sam_busy));
        if !self.status.is_empty() {
            ui.label(&self.status);
        }
    }
}

impl eframe::App for SegToolApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_results();

        egui::SidePanel::left("tools")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.tools_ui(ui));
            });

        let (left_event, right_event) = egui::CentralPanel::default()
            .show(ctx, |ui| {
                ui.columns(2, |columns| {
                    let left = self
                        .left_panel
                        .show(&mut columns[0], &self.study.left, &self.colors);
                    let right = self
                        .right_panel
                        .show(&mut columns[1], &self.study.right, &self.colors);
                    (left, right)
                })
            })
            .inner;

        if let Some(event) = left_event {
            self.on_box_drawn(ctx, Side::Left, event);
        }
        if let Some(event) = right_event {
            self.on_box_drawn(ctx, Side::Right, event);
        }
    }
}
