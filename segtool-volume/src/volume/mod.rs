use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use log::info;
use ndarray::{Array2, ArrayD, Axis, Ix2};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

pub mod orientation;

use orientation::{to_display, ViewOrientation};

/// A loaded NIfTI volume. 2-D and 3-D data are supported; 4-D inputs
/// collapse to their first volume at load time.
pub struct NiftiVolume {
    pub path: PathBuf,
    pub data: ArrayD<f32>,
    header: NiftiHeader,
}

impl NiftiVolume {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let object = ReaderOptions::new()
            .read_file(path)
            .with_context(|| format!("failed to read NIfTI file {}", path.display()))?;
        let header = object.header().clone();

        let mut data = object
            .into_volume()
            .into_ndarray::<f32>()
            .context("failed to decode NIfTI volume data")?;
        if data.ndim() == 4 {
            data = data.index_axis_move(Axis(3), 0);
        }
        ensure!(
            data.ndim() == 2 || data.ndim() == 3,
            "unsupported NIfTI dimensionality: {:?}",
            data.shape()
        );

        info!("loaded {} with shape {:?}", path.display(), data.shape());
        Ok(NiftiVolume {
            path: path.to_path_buf(),
            data,
            header,
        })
    }

    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    pub fn is_3d(&self) -> bool {
        self.data.ndim() == 3
    }

    /// Number of slices along the given orientation; 2-D data is its own
    /// single slice in every orientation.
    pub fn slice_count(&self, orientation: ViewOrientation) -> usize {
        if !self.is_3d() {
            return 1;
        }
        self.data.len_of(orientation.slice_axis())
    }

    /// Extract the slice at `idx` and map it into display space.
    /// Out-of-range indices clamp to the last slice.
    pub fn display_slice(&self, idx: usize, orientation: ViewOrientation) -> Array2<f32> {
        if !self.is_3d() {
            return self
                .data
                .view()
                .into_dimensionality::<Ix2>()
                .expect("2-D volume")
                .to_owned();
        }
        let idx = idx.min(self.slice_count(orientation).saturating_sub(1));
        let raw = self
            .data
            .index_axis(orientation.slice_axis(), idx)
            .into_dimensionality::<Ix2>()
            .expect("3-D volume slice")
            .to_owned();
        to_display(raw, orientation)
    }

    /// Build a volume from raw parts with a default header; in-crate
    /// tests use this instead of touching the filesystem.
    #[cfg(test)]
    pub(crate) fn from_parts(path: PathBuf, data: ArrayD<f32>) -> Self {
        NiftiVolume {
            path,
            data,
            header: NiftiHeader::default(),
        }
    }

    /// File stem with `.nii` / `.nii.gz` stripped, used for export names.
    pub fn stem(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.strip_suffix(".nii.gz")
            .or_else(|| name.strip_suffix(".nii"))
            .unwrap_or(&name)
            .to_owned()
    }
}

/// Write a label mask as NIfTI, carrying the reference volume's header
/// (and with it the affine) when one is given. Compression follows the
/// file extension, so `.nii.gz` comes out gzipped.
pub fn save_mask(
    path: impl AsRef<Path>,
    mask: &ArrayD<u8>,
    reference: Option<&NiftiVolume>,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut options = WriterOptions::new(path);
    if let Some(reference) = reference {
        options = options.reference_header(reference.header());
    }
    options
        .write_nifti(mask)
        .with_context(|| format!("failed to write mask {}", path.display()))?;
    info!("wrote mask {}", path.display());
    Ok(())
}
