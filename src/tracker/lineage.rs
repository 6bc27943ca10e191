//! Materialization of accepted edges into previous/next/track-head relations.

use std::collections::BTreeSet;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};
use crate::tracker::detection::{DetectionId, ParentTrack};

/// Origin of a lineage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkKind {
    /// Detection without any previous
    TrackStart,
    FrameToFrame,
    Split,
    Merge,
    GapClosing,
}

/// How track heads propagate through split and merge events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackHeadPolicy {
    /// Children of a split and merged detections keep the head of their
    /// primary previous.
    #[default]
    InheritFromParent,
    /// Every child of a split and every merged detection starts a new head.
    NewHeadPerBranch,
}

/// An accepted directed edge between two detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkEdge {
    pub previous: DetectionId,
    pub next: DetectionId,
    pub kind: LinkKind,
}

/// One record for the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineageLink {
    pub previous: Option<DetectionId>,
    pub next: Option<DetectionId>,
    pub kind: LinkKind,
    /// The previous has more than one next
    pub is_split: bool,
    /// The next has more than one previous
    pub is_merge: bool,
}

/// Previous/next adjacency and track heads, indexed by detection id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lineage {
    previous: Vec<Vec<DetectionId>>,
    next: Vec<Vec<DetectionId>>,
    heads: Vec<DetectionId>,
}

impl Lineage {
    /// Previous detections; the first one is the primary link.
    pub fn parents(&self, id: DetectionId) -> &[DetectionId] {
        self.previous.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children(&self, id: DetectionId) -> &[DetectionId] {
        self.next.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn track_head(&self, id: DetectionId) -> Option<DetectionId> {
        self.heads.get(id.index()).copied()
    }

    pub fn is_track_head(&self, id: DetectionId) -> bool {
        self.track_head(id) == Some(id)
    }

    /// Detections that are their own track head, ascending.
    pub fn track_heads(&self) -> Vec<DetectionId> {
        self.heads
            .iter()
            .enumerate()
            .filter(|&(i, h)| h.index() == i)
            .map(|(_, &h)| h)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }
}

fn corrupt(message: String) -> TrackingError {
    warn!("rejecting lineage: {}", message);
    TrackingError::CorruptLineage(message)
}

/// Apply accepted edges to the detections of `track`.
///
/// Edges must be listed with frame-to-frame and gap-closing links before the
/// split and merge links touching the same detections, so that the first
/// previous of every detection is its primary one.
pub fn materialize(
    track: &ParentTrack,
    edges: &[LinkEdge],
    policy: TrackHeadPolicy,
) -> Result<(Lineage, Vec<LineageLink>)> {
    let n = track.len();
    let mut previous: Vec<Vec<DetectionId>> = vec![Vec::new(); n];
    let mut next: Vec<Vec<DetectionId>> = vec![Vec::new(); n];
    let mut split_parents = vec![false; n];
    let mut merge_targets = vec![false; n];

    // (a) single links
    for edge in edges {
        let (Some(p), Some(s)) = (track.get(edge.previous), track.get(edge.next)) else {
            return Err(corrupt(format!(
                "dangling edge {} -> {}",
                edge.previous, edge.next
            )));
        };
        if s.frame <= p.frame {
            return Err(corrupt(format!(
                "edge {} -> {} goes from frame {} to frame {}",
                edge.previous, edge.next, p.frame, s.frame
            )));
        }
        if edge.kind == LinkKind::FrameToFrame && s.frame != p.frame + 1 {
            return Err(corrupt(format!(
                "frame-to-frame edge {} -> {} skips frames",
                edge.previous, edge.next
            )));
        }
        if next[edge.previous.index()].contains(&edge.next) {
            return Err(corrupt(format!(
                "duplicate edge {} -> {}",
                edge.previous, edge.next
            )));
        }
        next[edge.previous.index()].push(edge.next);
        previous[edge.next.index()].push(edge.previous);
        match edge.kind {
            LinkKind::Split => split_parents[edge.previous.index()] = true,
            LinkKind::Merge => merge_targets[edge.next.index()] = true,
            _ => {}
        }
    }

    for i in 0..n {
        let id = DetectionId(i as u32);
        if next[i].len() > 1 && !split_parents[i] {
            return Err(corrupt(format!("{id} has several next without a split")));
        }
        if previous[i].len() > 1 && !merge_targets[i] {
            return Err(corrupt(format!("{id} has several previous without a merge")));
        }
    }

    // (b) track heads in topological (frame, id) order
    let mut pending: Vec<usize> = previous.iter().map(Vec::len).collect();
    let mut ready: BTreeSet<(u32, DetectionId)> = track
        .iter()
        .filter(|(id, _)| pending[id.index()] == 0)
        .map(|(id, d)| (d.frame, id))
        .collect();
    let mut heads: Vec<Option<DetectionId>> = vec![None; n];
    let mut visited = 0;

    while let Some((_, id)) = ready.pop_first() {
        visited += 1;
        let parents = &previous[id.index()];
        let head = match parents.first() {
            None => id,
            Some(_) if policy == TrackHeadPolicy::NewHeadPerBranch && parents.len() > 1 => id,
            Some(p) if policy == TrackHeadPolicy::NewHeadPerBranch && next[p.index()].len() > 1 => {
                id
            }
            Some(p) => heads[p.index()]
                .ok_or_else(|| corrupt(format!("{id} visited before its previous {p}")))?,
        };
        heads[id.index()] = Some(head);

        for &child in &next[id.index()] {
            pending[child.index()] -= 1;
            if pending[child.index()] == 0 {
                ready.insert((track.detection(child).frame, child));
            }
        }
    }
    if visited != n {
        return Err(corrupt(format!(
            "cycle detected: {} of {} detections unreachable from a track head",
            n - visited,
            n
        )));
    }
    let heads: Vec<DetectionId> = heads.into_iter().flatten().collect();

    // (c) records, ordered by (next frame, next, previous)
    let mut links: Vec<LineageLink> = Vec::with_capacity(n + edges.len());
    for (id, _) in track.iter() {
        if previous[id.index()].is_empty() {
            links.push(LineageLink {
                previous: None,
                next: Some(id),
                kind: LinkKind::TrackStart,
                is_split: false,
                is_merge: false,
            });
        }
    }
    for edge in edges {
        links.push(LineageLink {
            previous: Some(edge.previous),
            next: Some(edge.next),
            kind: edge.kind,
            is_split: next[edge.previous.index()].len() > 1,
            is_merge: previous[edge.next.index()].len() > 1,
        });
    }
    links.sort_by_key(|l| {
        let succ = l.next.map(|id| (track.detection(id).frame, id));
        (succ, l.previous)
    });

    Ok((
        Lineage {
            previous,
            next,
            heads,
        },
        links,
    ))
}
