//! Volumetric data layer: NIfTI I/O, orientation slicing, annotation
//! session state and display composition.

pub mod export;
pub mod labels;
pub mod render;
pub mod session;
pub mod volume;

pub use session::{BoxAnnotation, ImageState, Side, StudyState};
pub use volume::orientation::ViewOrientation;
pub use volume::{save_mask, NiftiVolume};
