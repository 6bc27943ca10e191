//! Segment-level linking: split, merge and gap-closing passes over segment ends.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use log::debug;

use crate::error::{Result, Stage, TrackingError};
use crate::tracker::cost::{CostModel, OverlapMode, PairCost};
use crate::tracker::detection::{DetectionId, ParentTrack};
use crate::tracker::lap::{self, SparseCostMatrix};
use crate::tracker::lineage::{LinkEdge, LinkKind};
use crate::tracker::segment::SegmentGraph;

/// Thresholds and enabled passes of the segment-level linker.
#[derive(Debug, Clone, Copy)]
pub struct SegmentLinkSettings {
    pub allow_split: bool,
    pub allow_merge: bool,
    /// Maximum number of missing frames bridged; 0 disables gap-closing
    pub max_frame_gap: u32,
    pub max_link_cost: f64,
    pub max_link_cost_gap_closing: f64,
    pub alternative_cost_factor: f64,
}

/// Runs the passes in order (split, merge, gap-closing) over the live
/// segment state. Later passes only see ends that earlier ones left open.
pub struct SegmentLinker<'g, 'a> {
    track: &'a ParentTrack,
    graph: &'g mut SegmentGraph,
    costs: &'g CostModel<'a>,
    settings: SegmentLinkSettings,
    split_parents: Vec<bool>,
    merge_targets: Vec<bool>,
    edges: Vec<LinkEdge>,
}

impl<'g, 'a> SegmentLinker<'g, 'a> {
    pub fn new(
        track: &'a ParentTrack,
        graph: &'g mut SegmentGraph,
        costs: &'g CostModel<'a>,
        settings: SegmentLinkSettings,
    ) -> Self {
        Self {
            track,
            graph,
            costs,
            settings,
            split_parents: vec![false; track.len()],
            merge_targets: vec![false; track.len()],
            edges: Vec::new(),
        }
    }

    pub fn run(mut self) -> Result<Vec<LinkEdge>> {
        if self.settings.allow_split {
            // the second pass recovers splits lost to competing parents
            for _ in 0..2 {
                self.split_pass()?;
            }
        }
        if self.settings.allow_merge {
            for _ in 0..2 {
                self.merge_pass()?;
            }
        }
        if self.settings.max_frame_gap > 0 {
            self.gap_closing_pass()?;
        }
        Ok(self.edges)
    }

    /// Detections with a frame-to-frame successor may gain one more child.
    fn split_pass(&mut self) -> Result<()> {
        let sources: Vec<DetectionId> = self
            .in_frame_order()
            .filter(|&id| self.graph.has_successor(id) && !self.split_parents[id.index()])
            .collect();
        let targets = self.graph.open_starts();
        let cost = self.costs.for_mode(OverlapMode::Split);

        let accepted = self.solve(
            Stage::Split,
            &sources,
            &targets,
            cost.as_ref(),
            self.settings.max_link_cost,
            1..=1,
        )?;
        for &(parent, child) in &accepted {
            self.graph.consume_start(child)?;
            self.split_parents[parent.index()] = true;
            self.accept(parent, child, LinkKind::Split);
        }
        debug!("split pass: {} links", accepted.len());
        Ok(())
    }

    /// Open segment ends may join a detection that already has a predecessor.
    fn merge_pass(&mut self) -> Result<()> {
        let sources = self.graph.open_ends();
        let targets: Vec<DetectionId> = self
            .in_frame_order()
            .filter(|&id| self.graph.has_predecessor(id) && !self.merge_targets[id.index()])
            .collect();
        let cost = self.costs.for_mode(OverlapMode::Merge);

        let accepted = self.solve(
            Stage::Merge,
            &sources,
            &targets,
            cost.as_ref(),
            self.settings.max_link_cost,
            1..=1,
        )?;
        for &(parent, child) in &accepted {
            self.graph.consume_end(parent)?;
            self.merge_targets[child.index()] = true;
            self.accept(parent, child, LinkKind::Merge);
        }
        debug!("merge pass: {} links", accepted.len());
        Ok(())
    }

    /// Open ends join open starts in a later frame, across at most
    /// `max_frame_gap` missing frames and under the gap-closing threshold.
    fn gap_closing_pass(&mut self) -> Result<()> {
        let sources = self.graph.open_ends();
        let targets = self.graph.open_starts();
        let cost = self.costs.for_mode(OverlapMode::Normal);
        let max_delta = self.settings.max_frame_gap.saturating_add(1);

        let accepted = self.solve(
            Stage::GapClosing,
            &sources,
            &targets,
            cost.as_ref(),
            self.settings.max_link_cost_gap_closing,
            1..=max_delta,
        )?;
        for &(end, start) in &accepted {
            self.graph.consume_end(end)?;
            self.graph.consume_start(start)?;
            self.accept(end, start, LinkKind::GapClosing);
        }
        debug!("gap-closing pass: {} links", accepted.len());
        Ok(())
    }

    fn in_frame_order(&self) -> impl Iterator<Item = DetectionId> {
        let track = self.track;
        track
            .frames()
            .flat_map(move |frame| track.at_frame(frame).iter().copied())
    }

    fn accept(&mut self, previous: DetectionId, next: DetectionId, kind: LinkKind) {
        self.edges.push(LinkEdge {
            previous,
            next,
            kind,
        });
    }

    /// Solve one assignment between earlier `sources` and later `targets`
    /// whose frame difference lies in `delta`.
    fn solve(
        &self,
        stage: Stage,
        sources: &[DetectionId],
        targets: &[DetectionId],
        cost: &dyn PairCost,
        threshold: f64,
        delta: RangeInclusive<u32>,
    ) -> Result<Vec<(DetectionId, DetectionId)>> {
        let mut by_frame: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (col, &target) in targets.iter().enumerate() {
            by_frame
                .entry(self.track.detection(target).frame)
                .or_default()
                .push(col);
        }

        let mut matrix = SparseCostMatrix::new(sources.len(), targets.len());
        for (row, &source) in sources.iter().enumerate() {
            let frame = self.track.detection(source).frame;
            let window = frame.saturating_add(*delta.start())..=frame.saturating_add(*delta.end());
            for cols in by_frame.range(window).map(|(_, cols)| cols) {
                for &col in cols {
                    let target = targets[col];
                    if target == source {
                        continue;
                    }
                    if let Some(c) = cost.cost(source, target).filter(|&c| c <= threshold) {
                        matrix.push(row, col, c);
                    }
                }
            }
        }

        let result = lap::linear_assignment(&matrix, self.settings.alternative_cost_factor)
            .map_err(|message| TrackingError::infeasible(stage, message))?;
        Ok(result
            .matches
            .iter()
            .map(|&(row, col)| (sources[row], targets[col]))
            .collect())
    }
}
