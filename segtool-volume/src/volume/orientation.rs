use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Anatomical viewing orientation of a volume slice.
///
/// Volumes are stored `(H, W, Z)`; axial slices run along `Z`, coronal
/// along `W`, sagittal along `H`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewOrientation {
    Axial,
    Coronal,
    Sagittal,
}

impl ViewOrientation {
    pub const ALL: [ViewOrientation; 3] = [
        ViewOrientation::Axial,
        ViewOrientation::Coronal,
        ViewOrientation::Sagittal,
    ];

    /// Volume axis the slice index walks along.
    pub fn slice_axis(self) -> Axis {
        match self {
            ViewOrientation::Axial => Axis(2),
            ViewOrientation::Coronal => Axis(1),
            ViewOrientation::Sagittal => Axis(0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewOrientation::Axial => "Axial",
            ViewOrientation::Coronal => "Coronal",
            ViewOrientation::Sagittal => "Sagittal",
        }
    }
}

fn transposed<T>(a: Array2<T>) -> Array2<T> {
    a.reversed_axes()
}

fn flipped_ud<T>(mut a: Array2<T>) -> Array2<T> {
    a.invert_axis(Axis(0));
    a
}

fn flipped_lr<T>(mut a: Array2<T>) -> Array2<T> {
    a.invert_axis(Axis(1));
    a
}

/// Map a raw volume slice into display space.
///
/// Axial slices rotate 90 degrees clockwise so the patient's back faces
/// down; coronal and sagittal slices transpose so the Z axis runs
/// vertically, then flip to match radiological display convention.
pub fn to_display<T>(slice: Array2<T>, orientation: ViewOrientation) -> Array2<T> {
    match orientation {
        // rot90 clockwise == transpose + horizontal flip
        ViewOrientation::Axial => flipped_lr(transposed(slice)),
        ViewOrientation::Coronal => flipped_ud(transposed(slice)),
        ViewOrientation::Sagittal => flipped_lr(flipped_ud(transposed(slice))),
    }
}

/// Inverse of [`to_display`]: map a display-space slice back onto raw
/// volume axes.
pub fn from_display<T>(display: Array2<T>, orientation: ViewOrientation) -> Array2<T> {
    match orientation {
        ViewOrientation::Axial => transposed(flipped_lr(display)),
        ViewOrientation::Coronal => transposed(flipped_ud(display)),
        ViewOrientation::Sagittal => transposed(flipped_ud(flipped_lr(display))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn axial_rotates_clockwise() {
        let raw = array![[1, 2], [3, 4]];
        let shown = to_display(raw, ViewOrientation::Axial);
        assert_eq!(shown, array![[3, 1], [4, 2]]);
    }

    #[test]
    fn display_round_trips_every_orientation() {
        let raw = array![[1, 2, 3], [4, 5, 6]];
        for orientation in ViewOrientation::ALL {
            let back = from_display(to_display(raw.clone(), orientation), orientation);
            assert_eq!(back, raw, "{orientation:?}");
        }
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&ViewOrientation::Sagittal).unwrap();
        assert_eq!(json, "\"sagittal\"");
    }
}
