use anyhow::{bail, Result};
use ndarray::{Array2, ArrayD, Ix2, Zip};
use serde::{Deserialize, Serialize};

use crate::volume::orientation::{from_display, to_display, ViewOrientation};
use crate::volume::NiftiVolume;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// Export filename prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Side::Left => "l",
            Side::Right => "r",
        }
    }
}

/// One recorded bounding-box prompt. Coordinates are inclusive pixel
/// positions in display space of the slice the box was drawn on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxAnnotation {
    pub side: Side,
    pub slice_index: usize,
    pub orientation: ViewOrientation,
    pub label: u8,
    pub color: String,
    pub box_xyxy: [i64; 4],
}

/// Per-side annotation state: the loaded volume, the label mask growing
/// alongside it, and the recorded box prompts.
#[derive(Default)]
pub struct ImageState {
    pub volume: Option<NiftiVolume>,
    pub mask: Option<ArrayD<u8>>,
    pub boxes: Vec<BoxAnnotation>,
}

impl ImageState {
    pub fn clear(&mut self) {
        self.volume = None;
        self.mask = None;
        self.boxes.clear();
    }

    /// Zero the mask and forget recorded boxes, keeping the volume.
    pub fn reset_annotations(&mut self) {
        if let Some(volume) = &self.volume {
            self.mask = Some(ArrayD::zeros(volume.data.raw_dim()));
        } else {
            self.mask = None;
        }
        self.boxes.clear();
    }

    /// Allocate a zeroed mask matching the volume when absent or stale.
    pub fn ensure_mask(&mut self) {
        let Some(volume) = &self.volume else { return };
        let stale = self
            .mask
            .as_ref()
            .map(|mask| mask.shape() != volume.data.shape())
            .unwrap_or(true);
        if stale {
            self.mask = Some(ArrayD::zeros(volume.data.raw_dim()));
        }
    }

    /// The mask slice at `idx` under the same display transform the image
    /// slice uses, so overlay and image line up pixel for pixel.
    pub fn mask_display_slice(
        &self,
        idx: usize,
        orientation: ViewOrientation,
    ) -> Option<Array2<u8>> {
        let mask = self.mask.as_ref()?;
        if mask.ndim() == 2 {
            return mask.view().into_dimensionality::<Ix2>().ok().map(|m| m.to_owned());
        }
        let axis = orientation.slice_axis();
        let idx = idx.min(mask.len_of(axis).saturating_sub(1));
        let raw = mask
            .index_axis(axis, idx)
            .into_dimensionality::<Ix2>()
            .ok()?
            .to_owned();
        Some(to_display(raw, orientation))
    }

    /// Paint `label` into the stored mask wherever `display_mask` is set,
    /// inverting the display transform back onto volume axes. Previously
    /// painted labels on those voxels are overwritten.
    pub fn apply_display_mask(
        &mut self,
        idx: usize,
        display_mask: &Array2<bool>,
        label: u8,
        orientation: ViewOrientation,
    ) -> Result<()> {
        if self.volume.is_none() {
            return Ok(());
        }
        self.ensure_mask();
        let Some(mask) = self.mask.as_mut() else {
            return Ok(());
        };

        if mask.ndim() == 2 {
            let mut flat = mask.view_mut().into_dimensionality::<Ix2>()?;
            if flat.dim() != display_mask.dim() {
                bail!(
                    "mask shape {:?} does not match slice shape {:?}",
                    flat.dim(),
                    display_mask.dim()
                );
            }
            Zip::from(&mut flat)
                .and(display_mask)
                .for_each(|voxel, &hit| {
                    if hit {
                        *voxel = label;
                    }
                });
            return Ok(());
        }

        let local = from_display(display_mask.to_owned(), orientation);
        let axis = orientation.slice_axis();
        let idx = idx.min(mask.len_of(axis).saturating_sub(1));
        let mut slab = mask.index_axis_mut(axis, idx).into_dimensionality::<Ix2>()?;
        if slab.dim() != local.dim() {
            bail!(
                "slice shape {:?} does not match proposed mask {:?}",
                slab.dim(),
                local.dim()
            );
        }
        Zip::from(&mut slab).and(&local).for_each(|voxel, &hit| {
            if hit {
                *voxel = label;
            }
        });
        Ok(())
    }

    pub fn record_box(&mut self, annotation: BoxAnnotation) {
        self.boxes.push(annotation);
    }

    /// Drop the most recent box record. The painted mask stays as is;
    /// rolling it back would need per-action deltas.
    pub fn undo_last_box(&mut self) -> Option<BoxAnnotation> {
        self.boxes.pop()
    }
}

/// Both annotation sides of a study.
#[derive(Default)]
pub struct StudyState {
    pub left: ImageState,
    pub right: ImageState,
}

impl StudyState {
    pub fn side(&self, side: Side) -> &ImageState {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut ImageState {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use std::path::PathBuf;

    fn state_with_volume(shape: (usize, usize, usize)) -> ImageState {
        ImageState {
            volume: Some(NiftiVolume::from_parts(
                PathBuf::from("t.nii"),
                Array3::<f32>::zeros(shape).into_dyn(),
            )),
            mask: None,
            boxes: Vec::new(),
        }
    }

    fn display_mask_with_hit(
        state: &ImageState,
        idx: usize,
        orientation: ViewOrientation,
        at: (usize, usize),
    ) -> Array2<bool> {
        let shape = state
            .volume
            .as_ref()
            .unwrap()
            .display_slice(idx, orientation)
            .dim();
        let mut mask = Array2::from_elem(shape, false);
        mask[[at.0, at.1]] = true;
        mask
    }

    #[test]
    fn ensure_mask_matches_volume_shape() {
        let mut state = state_with_volume((3, 4, 5));
        state.ensure_mask();
        assert_eq!(state.mask.as_ref().unwrap().shape(), &[3, 4, 5]);

        // a stale mask gets reallocated
        state.mask = Some(ArrayD::zeros(vec![2, 2, 2]));
        state.ensure_mask();
        assert_eq!(state.mask.as_ref().unwrap().shape(), &[3, 4, 5]);
    }

    #[test]
    fn painted_display_pixel_round_trips() {
        for orientation in ViewOrientation::ALL {
            let mut state = state_with_volume((3, 4, 5));
            let hit = display_mask_with_hit(&state, 1, orientation, (0, 1));
            state.apply_display_mask(1, &hit, 7, orientation).unwrap();

            let shown = state.mask_display_slice(1, orientation).unwrap();
            assert_eq!(shown[[0, 1]], 7, "{orientation:?}");
            assert_eq!(shown.iter().filter(|&&v| v != 0).count(), 1);
            // exactly one voxel of the volume mask is set
            let total: usize = state
                .mask
                .as_ref()
                .unwrap()
                .iter()
                .filter(|&&v| v != 0)
                .count();
            assert_eq!(total, 1);
        }
    }

    #[test]
    fn later_labels_overwrite_earlier_ones() {
        let mut state = state_with_volume((3, 4, 5));
        let hit = display_mask_with_hit(&state, 0, ViewOrientation::Axial, (2, 1));
        state
            .apply_display_mask(0, &hit, 3, ViewOrientation::Axial)
            .unwrap();
        state
            .apply_display_mask(0, &hit, 9, ViewOrientation::Axial)
            .unwrap();
        let shown = state.mask_display_slice(0, ViewOrientation::Axial).unwrap();
        assert_eq!(shown[[2, 1]], 9);
    }

    #[test]
    fn apply_without_volume_is_a_no_op() {
        let mut state = ImageState::default();
        let mask = Array2::from_elem((2, 2), true);
        state
            .apply_display_mask(0, &mask, 1, ViewOrientation::Axial)
            .unwrap();
        assert!(state.mask.is_none());
    }

    #[test]
    fn mismatched_slice_shape_is_an_error() {
        let mut state = state_with_volume((3, 4, 5));
        let wrong = Array2::from_elem((2, 2), true);
        assert!(state
            .apply_display_mask(0, &wrong, 1, ViewOrientation::Axial)
            .is_err());
    }

    #[test]
    fn undo_pops_records_only() {
        let mut state = state_with_volume((3, 4, 5));
        let hit = display_mask_with_hit(&state, 0, ViewOrientation::Axial, (1, 1));
        state
            .apply_display_mask(0, &hit, 2, ViewOrientation::Axial)
            .unwrap();
        state.record_box(BoxAnnotation {
            side: Side::Left,
            slice_index: 0,
            orientation: ViewOrientation::Axial,
            label: 2,
            color: "blue".into(),
            box_xyxy: [0, 0, 2, 2],
        });

        assert!(state.undo_last_box().is_some());
        assert!(state.boxes.is_empty());
        assert!(state.undo_last_box().is_none());
        // mask untouched by undo
        let shown = state.mask_display_slice(0, ViewOrientation::Axial).unwrap();
        assert_eq!(shown[[1, 1]], 2);
    }

    #[test]
    fn box_annotation_json_shape() {
        let annotation = BoxAnnotation {
            side: Side::Right,
            slice_index: 12,
            orientation: ViewOrientation::Coronal,
            label: 3,
            color: "red".into(),
            box_xyxy: [4, 5, 40, 40],
        };
        let json = serde_json::to_value(&annotation).unwrap();
        assert_eq!(json["side"], "right");
        assert_eq!(json["orientation"], "coronal");
        assert_eq!(json["box_xyxy"][2], 40);
    }
}
