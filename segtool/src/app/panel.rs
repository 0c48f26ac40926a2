use eframe::egui::{self, ColorImage, RichText, TextureHandle, TextureOptions};
use hashbrown::HashMap;

use segtool_volume::render::{compose_overlay, normalize_to_u8};
use segtool_volume::session::ImageState;
use segtool_volume::{Side, ViewOrientation};

use super::canvas::{DrawnBox, ImageCanvas};

const OVERLAY_ALPHA: f32 = 0.4;

/// A finished box drag, tagged with where in the volume it happened.
pub struct PanelEvent {
    pub slice_index: usize,
    pub orientation: ViewOrientation,
    pub drawn: DrawnBox,
}

/// One side's viewer: orientation selector, slice slider and canvas.
pub struct ImagePanel {
    side: Side,
    title: &'static str,
    orientation: ViewOrientation,
    slice_index: usize,
    canvas: ImageCanvas,
    texture: Option<TextureHandle>,
    dirty: bool,
}

impl ImagePanel {
    pub fn new(side: Side, title: &'static str) -> Self {
        ImagePanel {
            side,
            title,
            orientation: ViewOrientation::Axial,
            slice_index: 0,
            canvas: ImageCanvas::default(),
            texture: None,
            dirty: true,
        }
    }

    /// Force the overlay texture to be rebuilt on the next frame.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Reset view state after a new volume lands on this side.
    pub fn volume_loaded(&mut self) {
        self.orientation = ViewOrientation::Axial;
        self.slice_index = 0;
        self.texture = None;
        self.dirty = true;
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        state: &ImageState,
        colors: &HashMap<u8, (u8, u8, u8)>,
    ) -> Option<PanelEvent> {
        ui.strong(self.title);

        let Some(volume) = &state.volume else {
            ui.label(RichText::new("(no volume)").small().italics());
            self.canvas.show(ui, None);
            return None;
        };
        ui.label(RichText::new(volume.path.display().to_string()).small());

        if volume.is_3d() {
            ui.horizontal(|ui| {
                ui.label("Orientation:");
                let mut orientation = self.orientation;
                egui::ComboBox::from_id_salt((self.side.as_str(), "orientation"))
                    .selected_text(orientation.label())
                    .show_ui(ui, |ui| {
                        for candidate in ViewOrientation::ALL {
                            ui.selectable_value(&mut orientation, candidate, candidate.label());
                        }
                    });
                if orientation != self.orientation {
                    self.orientation = orientation;
                    let count = volume.slice_count(orientation);
                    self.slice_index = self.slice_index.min(count.saturating_sub(1));
                    self.dirty = true;
                }
            });
        }

        let count = volume.slice_count(self.orientation);
        if count > 1 {
            let max = count - 1;
            ui.horizontal(|ui| {
                let before = self.slice_index;
                ui.add(egui::Slider::new(&mut self.slice_index, 0..=max));
                ui.label(format!("slice: {}/{max}", self.slice_index));
                if self.slice_index != before {
                    self.dirty = true;
                }
            });
        } else {
            ui.label("slice: 0/0");
        }

        if self.dirty {
            self.refresh_texture(ui.ctx(), state, colors);
        }

        self.canvas
            .show(ui, self.texture.as_ref())
            .map(|drawn| PanelEvent {
                slice_index: self.slice_index,
                orientation: self.orientation,
                drawn,
            })
    }

    fn refresh_texture(
        &mut self,
        ctx: &egui::Context,
        state: &ImageState,
        colors: &HashMap<u8, (u8, u8, u8)>,
    ) {
        let Some(volume) = &state.volume else { return };
        let slice = volume.display_slice(self.slice_index, self.orientation);
        let base = normalize_to_u8(slice.view());
        let mask = state.mask_display_slice(self.slice_index, self.orientation);
        let rgb = compose_overlay(&base, mask.as_ref(), colors, OVERLAY_ALPHA);

        let (h, w) = base.dim();
        let image = ColorImage::from_rgb([w, h], &rgb);
        self.texture = Some(ctx.load_texture(
            format!("{}-slice", self.side.as_str()),
            image,
            TextureOptions::NEAREST,
        ));
        self.dirty = false;
    }
}
