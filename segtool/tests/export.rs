use ndarray::{Array2, ArrayD};

use segtool_volume::export::export_study;
use segtool_volume::session::BoxAnnotation;
use segtool_volume::{save_mask, NiftiVolume, Side, StudyState, ViewOrientation};

#[test]
fn annotate_and_export_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    // synthesize a small volume on disk, then load it like the app would
    let source: ArrayD<u8> =
        ArrayD::from_shape_fn(vec![6, 5, 4], |ix| (ix[0] + ix[1] + ix[2]) as u8);
    let volume_path = dir.path().join("ribs.nii.gz");
    save_mask(&volume_path, &source, None)?;

    let mut study = StudyState::default();
    study.left.volume = Some(NiftiVolume::open(&volume_path)?);
    study.left.ensure_mask();

    // paint one axial display pixel with label 3 and record its box
    let shape = study
        .left
        .volume
        .as_ref()
        .unwrap()
        .display_slice(2, ViewOrientation::Axial)
        .dim();
    let mut hit = Array2::from_elem(shape, false);
    hit[[1, 2]] = true;
    study
        .left
        .apply_display_mask(2, &hit, 3, ViewOrientation::Axial)?;
    study.left.record_box(BoxAnnotation {
        side: Side::Left,
        slice_index: 2,
        orientation: ViewOrientation::Axial,
        label: 3,
        color: "red".into(),
        box_xyxy: [1, 0, 3, 2],
    });

    let out = dir.path().join("out");
    let written = export_study(&mut study, &out)?;
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].mask.file_name().unwrap(), "lribs_mask.nii.gz");
    assert_eq!(written[0].boxes.file_name().unwrap(), "lribs_boxes.json");

    // the exported mask reloads with exactly one labelled voxel
    let exported = NiftiVolume::open(&written[0].mask)?;
    assert_eq!(exported.data.shape(), &[6, 5, 4]);
    let labelled: Vec<f32> = exported
        .data
        .iter()
        .copied()
        .filter(|&v| v != 0.0)
        .collect();
    assert_eq!(labelled, vec![3.0]);

    // and the box records parse back with their fields intact
    let payload = std::fs::read_to_string(&written[0].boxes)?;
    let boxes: Vec<BoxAnnotation> = serde_json::from_str(&payload)?;
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].side, Side::Left);
    assert_eq!(boxes[0].orientation, ViewOrientation::Axial);
    assert_eq!(boxes[0].box_xyxy, [1, 0, 3, 2]);

    Ok(())
}

#[test]
fn right_side_gets_the_r_prefix_and_empty_boxes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let source: ArrayD<u8> = ArrayD::zeros(vec![3, 3, 3]);
    let volume_path = dir.path().join("spine.nii.gz");
    save_mask(&volume_path, &source, None)?;

    let mut study = StudyState::default();
    study.right.volume = Some(NiftiVolume::open(&volume_path)?);

    let out = dir.path().join("out");
    let written = export_study(&mut study, &out)?;
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].mask.file_name().unwrap(), "rspine_mask.nii.gz");

    let payload = std::fs::read_to_string(&written[0].boxes)?;
    let boxes: Vec<BoxAnnotation> = serde_json::from_str(&payload)?;
    assert!(boxes.is_empty());

    Ok(())
}
