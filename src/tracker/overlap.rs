//! Pairwise overlap lookup with a per-call memo shared between worker threads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::tracker::detection::{Detection, DetectionId, ParentTrack};

/// Computes the overlap volume of two detections.
///
/// `None` means the overlap is unknown (e.g. shape data is missing); the pair
/// then simply has no overlap edge.
pub trait OverlapSource: Send + Sync {
    fn overlap(&self, a: &Detection, b: &Detection) -> Option<f64>;
}

impl<F> OverlapSource for F
where
    F: Fn(&Detection, &Detection) -> Option<f64> + Send + Sync,
{
    fn overlap(&self, a: &Detection, b: &Detection) -> Option<f64> {
        self(a, b)
    }
}

/// Overlap of the detections' bounding boxes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundsOverlap;

impl OverlapSource for BoundsOverlap {
    fn overlap(&self, a: &Detection, b: &Detection) -> Option<f64> {
        match (&a.bounds, &b.bounds) {
            (Some(ba), Some(bb)) => Some(ba.intersection(bb)),
            _ => None,
        }
    }
}

/// Unordered pair of detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey(DetectionId, DetectionId);

impl PairKey {
    fn new(a: DetectionId, b: DetectionId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    fn shard(&self, shard_count: usize) -> usize {
        let mixed = (self.0.0 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ self.1.0 as u64;
        (mixed % shard_count as u64) as usize
    }
}

type Cell = Arc<OnceLock<Option<f64>>>;

const SHARD_COUNT: usize = 16;

/// Memoized overlap per unordered detection pair, valid for one tracking call.
///
/// Shard locks only guard the lookup of a pair's cell; the overlap itself is
/// computed inside [`OnceLock::get_or_init`], so concurrent requests for the
/// same pair wait for the single computation instead of repeating it.
pub struct OverlapCache<'a> {
    track: &'a ParentTrack,
    source: &'a dyn OverlapSource,
    shards: Vec<Mutex<HashMap<PairKey, Cell>>>,
    computed: AtomicUsize,
}

impl<'a> OverlapCache<'a> {
    pub fn new(track: &'a ParentTrack, source: &'a dyn OverlapSource) -> Self {
        Self {
            track,
            source,
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
            computed: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, a: DetectionId, b: DetectionId) -> Option<f64> {
        let key = PairKey::new(a, b);
        let cell = {
            let mut shard = self.shards[key.shard(self.shards.len())].lock();
            Arc::clone(shard.entry(key).or_default())
        };

        *cell.get_or_init(|| {
            self.computed.fetch_add(1, Ordering::Relaxed);
            let (first, second) = (self.track.get(key.0)?, self.track.get(key.1)?);
            self.source
                .overlap(first, second)
                .filter(|overlap| overlap.is_finite())
        })
    }

    /// Number of overlaps actually computed so far.
    pub fn computed_count(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }
}
