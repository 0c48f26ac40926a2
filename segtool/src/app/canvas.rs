use eframe::egui::{
    self, Align2, Color32, FontId, PointerButton, Pos2, Rect, Sense, Stroke, TextureHandle, Vec2,
};

/// A completed drag rectangle in image pixel coordinates, corners
/// inclusive and ordered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawnBox {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl DrawnBox {
    pub fn as_xyxy(&self) -> [i64; 4] {
        [self.x0 as i64, self.y0 as i64, self.x1 as i64, self.y1 as i64]
    }
}

/// Letterboxed slice display with rubber-band box drawing.
#[derive(Default)]
pub struct ImageCanvas {
    drag_start: Option<Pos2>,
}

impl ImageCanvas {
    /// Render the texture into the remaining space and report a finished
    /// left-button drag as a box in image pixels. Boxes smaller than 2 px
    /// on either edge are discarded.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        texture: Option<&TextureHandle>,
    ) -> Option<DrawnBox> {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter().with_clip_rect(rect);
        painter.rect_filled(rect, 0.0, Color32::from_rgb(20, 20, 20));

        let Some(texture) = texture else {
            self.drag_start = None;
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No image",
                FontId::proportional(14.0),
                Color32::from_rgb(180, 180, 180),
            );
            return None;
        };

        let target = letterbox(rect, texture.size_vec2());
        painter.image(
            texture.id(),
            target,
            Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );

        if response.drag_started_by(PointerButton::Primary) {
            self.drag_start = response.interact_pointer_pos();
        }

        let pointer = response.interact_pointer_pos();
        if let (Some(start), Some(current)) = (self.drag_start, pointer) {
            painter.rect_stroke(
                Rect::from_two_pos(start, current),
                0.0,
                Stroke::new(2.0, Color32::GREEN),
            );
        }

        if response.drag_stopped_by(PointerButton::Primary) {
            let start = self.drag_start.take();
            let size = texture.size();
            if let (Some(start), Some(end)) = (start, pointer) {
                return box_in_image_coords(start, end, target, (size[0], size[1]));
            }
        }
        None
    }
}

/// Largest rect of the image's aspect ratio centered inside `outer`.
fn letterbox(outer: Rect, image: Vec2) -> Rect {
    if image.x <= 0.0 || image.y <= 0.0 {
        return outer;
    }
    let scale = (outer.width() / image.x).min(outer.height() / image.y);
    Rect::from_center_size(outer.center(), image * scale)
}

fn box_in_image_coords(
    start: Pos2,
    end: Pos2,
    target: Rect,
    (width, height): (usize, usize),
) -> Option<DrawnBox> {
    if target.width() <= 1.0 || target.height() <= 1.0 || width == 0 || height == 0 {
        return None;
    }

    let to_image = |p: Pos2| -> (usize, usize) {
        let x = ((p.x - target.left()) / target.width()).clamp(0.0, 1.0);
        let y = ((p.y - target.top()) / target.height()).clamp(0.0, 1.0);
        let xi = (x * (width - 1) as f32).round() as usize;
        let yi = (y * (height - 1) as f32).round() as usize;
        (xi.min(width - 1), yi.min(height - 1))
    };

    let (ax, ay) = to_image(start);
    let (bx, by) = to_image(end);
    let (x0, x1) = (ax.min(bx), ax.max(bx));
    let (y0, y1) = (ay.min(by), ay.max(by));

    if x1 - x0 < 2 || y1 - y0 < 2 {
        return None;
    }
    Some(DrawnBox { x0, y0, x1, y1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_maps_into_image_pixels() {
        // image shown 1:1 at origin
        let target = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 100.0));
        let drawn = box_in_image_coords(
            Pos2::new(0.0, 0.0),
            Pos2::new(50.0, 100.0),
            target,
            (101, 101),
        )
        .unwrap();
        assert_eq!(drawn, DrawnBox { x0: 0, y0: 0, x1: 50, y1: 100 });
    }

    #[test]
    fn corners_swap_when_dragged_backwards() {
        let target = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 100.0));
        let drawn = box_in_image_coords(
            Pos2::new(80.0, 90.0),
            Pos2::new(10.0, 20.0),
            target,
            (101, 101),
        )
        .unwrap();
        assert!(drawn.x0 < drawn.x1 && drawn.y0 < drawn.y1);
    }

    #[test]
    fn positions_clamp_to_the_letterbox() {
        let target = Rect::from_min_size(Pos2::new(10.0, 10.0), Vec2::new(100.0, 100.0));
        let drawn = box_in_image_coords(
            Pos2::new(-500.0, -500.0),
            Pos2::new(500.0, 500.0),
            target,
            (51, 51),
        )
        .unwrap();
        assert_eq!(drawn.as_xyxy(), [0, 0, 50, 50]);
    }

    #[test]
    fn tiny_boxes_are_rejected() {
        let target = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 100.0));
        let drawn = box_in_image_coords(
            Pos2::new(10.0, 10.0),
            Pos2::new(11.0, 11.0),
            target,
            (101, 101),
        );
        assert!(drawn.is_none());
    }

    #[test]
    fn letterbox_preserves_aspect() {
        let outer = Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 100.0));
        let target = letterbox(outer, Vec2::new(50.0, 50.0));
        assert_eq!(target.width(), target.height());
        assert_eq!(target.center(), outer.center());
    }
}
