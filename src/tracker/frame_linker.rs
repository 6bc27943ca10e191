//! Frame-to-frame linking: one assignment problem per pair of consecutive frames.

use log::debug;
use rayon::prelude::*;

use crate::error::{Result, Stage, TrackingError};
use crate::tracker::cost::PairCost;
use crate::tracker::detection::{DetectionId, ParentTrack};
use crate::tracker::lap::{self, SparseCostMatrix};

/// Candidate links between frame `t` (rows) and frame `t + 1` (cols).
struct FramePairProblem<'t> {
    frames: (u32, u32),
    sources: &'t [DetectionId],
    targets: &'t [DetectionId],
    matrix: SparseCostMatrix,
}

fn build_problem<'t>(
    track: &'t ParentTrack,
    frames: (u32, u32),
    cost: &dyn PairCost,
    max_link_cost: f64,
) -> FramePairProblem<'t> {
    let sources = track.at_frame(frames.0);
    let targets = track.at_frame(frames.1);
    let mut matrix = SparseCostMatrix::new(sources.len(), targets.len());

    for (row, &source) in sources.iter().enumerate() {
        for (col, &target) in targets.iter().enumerate() {
            if source == target {
                continue;
            }
            if let Some(c) = cost.cost(source, target).filter(|&c| c <= max_link_cost) {
                matrix.push(row, col, c);
            }
        }
    }

    FramePairProblem {
        frames,
        sources,
        targets,
        matrix,
    }
}

/// Link detections of literally consecutive frames.
///
/// Cost matrices are built in parallel; each frame pair is then solved on its
/// own, in frame order. Returns `(previous, next)` pairs ascending by frame and
/// previous id.
pub fn link_frames(
    track: &ParentTrack,
    cost: &dyn PairCost,
    max_link_cost: f64,
    alternative_cost_factor: f64,
) -> Result<Vec<(DetectionId, DetectionId)>> {
    let pairs = track.consecutive_frame_pairs();
    let problems: Vec<FramePairProblem<'_>> = pairs
        .par_iter()
        .map(|&frames| build_problem(track, frames, cost, max_link_cost))
        .collect();

    let mut links = Vec::new();
    for problem in &problems {
        let result = lap::linear_assignment(&problem.matrix, alternative_cost_factor).map_err(
            |message| {
                TrackingError::infeasible(
                    Stage::FrameToFrame,
                    format!("frames {} -> {}: {}", problem.frames.0, problem.frames.1, message),
                )
            },
        )?;
        links.extend(
            result
                .matches
                .iter()
                .map(|&(row, col)| (problem.sources[row], problem.targets[col])),
        );
    }

    debug!(
        "frame-to-frame: {} frame pairs, {} links",
        problems.len(),
        links.len()
    );
    Ok(links)
}
