use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::session::{ImageState, Side, StudyState};
use crate::volume::save_mask;

/// Output files written for one side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportPaths {
    pub mask: PathBuf,
    pub boxes: PathBuf,
}

/// Write one side's mask (`{l|r}{stem}_mask.nii.gz`, reference header from
/// the loaded volume) and box records (`{l|r}{stem}_boxes.json`). Returns
/// `None` when the side has no volume loaded.
pub fn export_side(
    state: &mut ImageState,
    side: Side,
    out_dir: &Path,
) -> Result<Option<ExportPaths>> {
    state.ensure_mask();
    let (Some(volume), Some(mask)) = (&state.volume, &state.mask) else {
        return Ok(None);
    };

    let base_name = format!("{}{}", side.prefix(), volume.stem());

    let mask_path = out_dir.join(format!("{base_name}_mask.nii.gz"));
    save_mask(&mask_path, mask, Some(volume))?;

    let boxes_path = out_dir.join(format!("{base_name}_boxes.json"));
    let payload = serde_json::to_string_pretty(&state.boxes)
        .context("failed to serialize box annotations")?;
    fs::write(&boxes_path, payload)
        .with_context(|| format!("failed to write {}", boxes_path.display()))?;

    info!(
        "exported {} side to {} / {}",
        side.as_str(),
        mask_path.display(),
        boxes_path.display()
    );
    Ok(Some(ExportPaths {
        mask: mask_path,
        boxes: boxes_path,
    }))
}

/// Export every loaded side of the study into `out_dir`.
pub fn export_study(study: &mut StudyState, out_dir: &Path) -> Result<Vec<ExportPaths>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut written = Vec::new();
    for side in [Side::Left, Side::Right] {
        if let Some(paths) = export_side(study.side_mut(side), side, out_dir)? {
            written.push(paths);
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_without_volume_writes_nothing() {
        let mut study = StudyState::default();
        let out = std::env::temp_dir().join("segtool-empty-export");
        let written = export_study(&mut study, &out).unwrap();
        assert!(written.is_empty());
    }
}
