//! Track segments: maximal frame-contiguous chains built from frame-to-frame links.

use crate::error::{Result, TrackingError};
use crate::tracker::detection::{DetectionId, ParentTrack};
use crate::tracker::end_state::EndState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub usize);

/// Ordered detections, one per consecutive frame, with no branching.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSegment {
    pub detections: Vec<DetectionId>,
    pub start: EndState,
    pub end: EndState,
}

impl TrackSegment {
    #[inline]
    pub fn first(&self) -> DetectionId {
        self.detections[0]
    }

    #[inline]
    pub fn last(&self) -> DetectionId {
        self.detections[self.detections.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Segments of one tracking call plus the position of every detection in them.
#[derive(Debug, Clone, Default)]
pub struct SegmentGraph {
    segments: Vec<TrackSegment>,
    position: Vec<(SegmentId, usize)>,
}

impl SegmentGraph {
    /// Chain frame-to-frame links into segments.
    ///
    /// Every detection belongs to exactly one segment; unlinked detections form
    /// single-detection segments. Segment ids follow the (frame, id) order of
    /// their first detection.
    pub fn build(track: &ParentTrack, links: &[(DetectionId, DetectionId)]) -> Result<Self> {
        let n = track.len();
        let mut next: Vec<Option<DetectionId>> = vec![None; n];
        let mut has_previous = vec![false; n];

        for &(prev, succ) in links {
            let (p, s) = (track.get(prev), track.get(succ));
            let contiguous = matches!((p, s), (Some(p), Some(s)) if p.frame + 1 == s.frame);
            if !contiguous {
                return Err(TrackingError::CorruptLineage(format!(
                    "frame-to-frame link {prev} -> {succ} is not between consecutive frames"
                )));
            }
            if next[prev.index()].replace(succ).is_some() || has_previous[succ.index()] {
                return Err(TrackingError::CorruptLineage(format!(
                    "frame-to-frame link {prev} -> {succ} branches"
                )));
            }
            has_previous[succ.index()] = true;
        }

        let mut segments = Vec::new();
        let mut position = vec![(SegmentId(0), 0); n];
        for frame in track.frames() {
            for &head in track.at_frame(frame) {
                if has_previous[head.index()] {
                    continue;
                }
                let id = SegmentId(segments.len());
                let mut detections = vec![head];
                let mut cursor = head;
                while let Some(succ) = next[cursor.index()] {
                    detections.push(succ);
                    cursor = succ;
                }
                for (i, d) in detections.iter().enumerate() {
                    position[d.index()] = (id, i);
                }
                segments.push(TrackSegment {
                    detections,
                    start: EndState::Open,
                    end: EndState::Open,
                });
            }
        }

        Ok(Self { segments, position })
    }

    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[inline]
    pub fn segment_of(&self, id: DetectionId) -> SegmentId {
        self.position[id.index()].0
    }

    pub fn segment(&self, id: SegmentId) -> &TrackSegment {
        &self.segments[id.0]
    }

    /// Whether the detection has a frame-to-frame successor.
    pub fn has_successor(&self, id: DetectionId) -> bool {
        let (seg, i) = self.position[id.index()];
        i + 1 < self.segments[seg.0].len()
    }

    /// Whether the detection has a frame-to-frame predecessor.
    pub fn has_predecessor(&self, id: DetectionId) -> bool {
        self.position[id.index()].1 > 0
    }

    /// First detections of segments whose start is still open.
    pub fn open_starts(&self) -> Vec<DetectionId> {
        self.segments
            .iter()
            .filter(|s| s.start.is_open())
            .map(TrackSegment::first)
            .collect()
    }

    /// Last detections of segments whose end is still open.
    pub fn open_ends(&self) -> Vec<DetectionId> {
        self.segments
            .iter()
            .filter(|s| s.end.is_open())
            .map(TrackSegment::last)
            .collect()
    }

    /// Mark the start of the segment beginning at `id` as consumed.
    pub fn consume_start(&mut self, id: DetectionId) -> Result<()> {
        let seg = &mut self.segments[self.position[id.index()].0.0];
        if seg.first() != id || !seg.start.consume() {
            return Err(TrackingError::CorruptLineage(format!(
                "{id} is not an open segment start"
            )));
        }
        Ok(())
    }

    /// Mark the end of the segment finishing at `id` as consumed.
    pub fn consume_end(&mut self, id: DetectionId) -> Result<()> {
        let seg = &mut self.segments[self.position[id.index()].0.0];
        if seg.last() != id || !seg.end.consume() {
            return Err(TrackingError::CorruptLineage(format!(
                "{id} is not an open segment end"
            )));
        }
        Ok(())
    }
}
