use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use anyhow::{ensure, Result};
use eframe::egui;
use log::debug;
use ndarray::Array2;

use segtool_inference::inference::sam::image_inference::{SamImageInference, SamImageSession};
use segtool_inference::utils::graph::{PromptBox, SamPrompt};
use segtool_volume::{Side, ViewOrientation};

/// Descriptor of one inference request; travels to the worker thread and
/// comes back attached to the result.
#[derive(Clone, Debug)]
pub struct SamJob {
    pub side: Side,
    pub slice_index: usize,
    pub orientation: ViewOrientation,
    pub label: u8,
    /// Display-slice shape `(h, w)` the mask must come back in.
    pub shape: (usize, usize),
}

pub struct SamJobResult {
    pub job: SamJob,
    pub outcome: Result<Array2<bool>>,
}

/// Run one box prompt on a background thread. The GUI keeps painting;
/// the result arrives over `tx` and a repaint is requested so it gets
/// picked up promptly.
pub fn spawn(
    session: Arc<SamImageSession>,
    rgb: Vec<u8>,
    box_xyxy: [i64; 4],
    job: SamJob,
    tx: Sender<SamJobResult>,
    ctx: egui::Context,
) {
    thread::spawn(move || {
        let outcome = run(&session, &rgb, box_xyxy, &job);
        // a closed receiver just means the app is shutting down
        let _ = tx.send(SamJobResult { job, outcome });
        ctx.request_repaint();
    });
}

fn run(
    session: &SamImageSession,
    rgb: &[u8],
    box_xyxy: [i64; 4],
    job: &SamJob,
) -> Result<Array2<bool>> {
    let (h, w) = job.shape;
    debug!(
        "running SAM on {} slice {} ({:?})",
        job.side.as_str(),
        job.slice_index,
        job.orientation
    );

    let encoded = session.encode_image(rgb, (w, h))?;
    let prompt = SamPrompt::Box(PromptBox::from_xyxy(box_xyxy));
    let bits = session.inference_frame(prompt, &encoded)?;
    ensure!(
        bits.len() == w * h,
        "mask bit count {} does not match slice {}x{}",
        bits.len(),
        w,
        h
    );

    Ok(Array2::from_shape_fn((h, w), |(y, x)| bits[y * w + x]))
}
