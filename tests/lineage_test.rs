use std::collections::HashMap;

use celltrack_rs::tracker::{MIN_LINK_COST, TrackHeadPolicy};
use celltrack_rs::{
    BatchTracker, BoundingBox, Detection, DetectionBuilder, DetectionId, DistanceMode,
    LineageTracker, LinkKind, ParentTrack, TrackerConfig, TrackingResult,
};

fn point(track: &mut ParentTrack, frame: u32, x: f64, y: f64) -> DetectionId {
    track.push(DetectionBuilder::new(frame).center_2d(x, y).size(10.0).build())
}

fn boxed(track: &mut ParentTrack, frame: u32, x: f64, width: f64) -> DetectionId {
    track.push(
        DetectionBuilder::new(frame)
            .bounds(BoundingBox::new_2d(x, 0.0, width, 10.0))
            .build(),
    )
}

fn center_config(max_link_cost: f64) -> TrackerConfig {
    TrackerConfig {
        distance_mode: DistanceMode::Center,
        max_link_cost,
        ..Default::default()
    }
}

fn edges(result: &TrackingResult) -> Vec<(DetectionId, DetectionId, LinkKind)> {
    result
        .links
        .iter()
        .filter_map(|l| Some((l.previous?, l.next?, l.kind)))
        .collect()
}

fn squared_distance(track: &ParentTrack, a: DetectionId, b: DetectionId) -> f64 {
    let d = track.detection(b).center - track.detection(a).center;
    d.x * d.x + d.y * d.y
}

/// Objects drifting along x, some of them missing for a few frames.
fn crowded_track() -> ParentTrack {
    let mut track = ParentTrack::new();
    for frame in 0..8u32 {
        for object in 0..6u32 {
            if (object + frame) % 5 == 0 && frame > 0 {
                continue;
            }
            let x = object as f64 * 20.0 + frame as f64 * 1.5 + ((object * 7 + frame * 3) % 4) as f64;
            let y = (object % 2) as f64 * 3.0;
            point(&mut track, frame, x, y);
        }
    }
    track
}

#[test]
fn test_scenario_a_two_independent_tracks() {
    let mut track = ParentTrack::new();
    let a: Vec<_> = (0..3).map(|f| point(&mut track, f, f as f64, 0.0)).collect();
    let b: Vec<_> = (0..3)
        .map(|f| point(&mut track, f, 100.0 + f as f64 * 0.5, 0.0))
        .collect();

    let result = LineageTracker::new(center_config(1e6))
        .unwrap()
        .track(&track)
        .unwrap();

    assert_eq!(result.segment_count, 2);
    assert_eq!(result.count(LinkKind::FrameToFrame), 4);
    assert_eq!(result.count(LinkKind::TrackStart), 2);
    assert_eq!(result.count(LinkKind::Split) + result.count(LinkKind::Merge), 0);
    for chain in [&a, &b] {
        assert_eq!(result.lineage.children(chain[0]), &[chain[1]]);
        assert_eq!(result.lineage.children(chain[1]), &[chain[2]]);
        assert!(chain.iter().all(|&id| result.lineage.track_head(id) == Some(chain[0])));
    }
    assert!(result.links.iter().all(|l| !l.is_split && !l.is_merge));
}

#[test]
fn test_scenario_b_split_produces_two_children() {
    let mut track = ParentTrack::new();
    let mother = boxed(&mut track, 0, 0.0, 10.0);
    let larger = boxed(&mut track, 1, 0.0, 6.0);
    let smaller = boxed(&mut track, 1, 6.0, 4.0);

    let config = TrackerConfig {
        distance_mode: DistanceMode::Overlap,
        allow_split: true,
        ..Default::default()
    };
    let result = LineageTracker::new(config).unwrap().track(&track).unwrap();

    assert_eq!(result.lineage.children(mother), &[larger, smaller]);
    assert_eq!(result.lineage.parents(larger), &[mother]);
    assert_eq!(result.lineage.parents(smaller), &[mother]);
    assert_eq!(
        edges(&result),
        vec![
            (mother, larger, LinkKind::FrameToFrame),
            (mother, smaller, LinkKind::Split),
        ]
    );
    let split_records: Vec<_> = result.links.iter().filter(|l| l.is_split).collect();
    assert_eq!(split_records.len(), 2);
    assert!(split_records.iter().all(|l| l.previous == Some(mother)));

    // both children keep the mother's head by default
    assert_eq!(result.lineage.track_head(smaller), Some(mother));
    assert_eq!(result.lineage.track_heads(), vec![mother]);
}

#[test]
fn test_split_without_split_pass_starts_new_track() {
    let mut track = ParentTrack::new();
    let mother = boxed(&mut track, 0, 0.0, 10.0);
    let larger = boxed(&mut track, 1, 0.0, 6.0);
    let smaller = boxed(&mut track, 1, 6.0, 4.0);

    let result = LineageTracker::new(TrackerConfig::default())
        .unwrap()
        .track(&track)
        .unwrap();
    assert_eq!(result.lineage.children(mother), &[larger]);
    assert!(result.lineage.is_track_head(smaller));
}

#[test]
fn test_split_needs_a_frame_to_frame_child() {
    let mut track = ParentTrack::new();
    let mother = boxed(&mut track, 0, 0.0, 10.0);
    let left = boxed(&mut track, 1, 0.0, 2.5);
    let right = boxed(&mut track, 1, 7.5, 2.5);

    let config = TrackerConfig {
        allow_split: true,
        ..Default::default()
    };
    let result = LineageTracker::new(config).unwrap().track(&track).unwrap();
    assert!(result.lineage.children(mother).is_empty());
    assert!(result.lineage.is_track_head(left));
    assert!(result.lineage.is_track_head(right));
    assert_eq!(result.count(LinkKind::Split), 0);
}

#[test]
fn test_new_head_per_branch_policy() {
    let mut track = ParentTrack::new();
    let mother = boxed(&mut track, 0, 0.0, 10.0);
    let larger = boxed(&mut track, 1, 0.0, 6.0);
    let smaller = boxed(&mut track, 1, 6.0, 4.0);
    let grandchild = boxed(&mut track, 2, 0.0, 6.0);

    let config = TrackerConfig {
        allow_split: true,
        track_head_policy: TrackHeadPolicy::NewHeadPerBranch,
        ..Default::default()
    };
    let result = LineageTracker::new(config).unwrap().track(&track).unwrap();

    assert_eq!(result.lineage.track_head(mother), Some(mother));
    assert_eq!(result.lineage.track_head(larger), Some(larger));
    assert_eq!(result.lineage.track_head(smaller), Some(smaller));
    assert_eq!(result.lineage.track_head(grandchild), Some(larger));
}

#[test]
fn test_merge_joins_two_parents() {
    let mut track = ParentTrack::new();
    let left = boxed(&mut track, 0, 0.0, 6.0);
    let right = boxed(&mut track, 0, 6.0, 4.0);
    let fused = boxed(&mut track, 1, 0.0, 10.0);

    let config = TrackerConfig {
        allow_merge: true,
        ..Default::default()
    };
    let result = LineageTracker::new(config).unwrap().track(&track).unwrap();

    assert_eq!(result.lineage.parents(fused), &[left, right]);
    assert_eq!(result.count(LinkKind::Merge), 1);
    assert_eq!(result.count(LinkKind::FrameToFrame), 1);
    assert_eq!(result.lineage.track_head(fused), Some(left));
    assert_eq!(result.links.iter().filter(|l| l.is_merge).count(), 2);
}

#[test]
fn test_scenario_c_gap_closing() {
    let mut track = ParentTrack::new();
    let early = point(&mut track, 0, 0.0, 0.0);
    for frame in 0..4 {
        point(&mut track, frame, 500.0, 0.0);
    }
    let late = point(&mut track, 3, 1.0, 0.0);

    let config = |max_frame_gap| TrackerConfig {
        distance_mode: DistanceMode::Center,
        max_link_cost: 10.0,
        allow_gaps: true,
        max_frame_gap,
        max_link_cost_gap_closing: 10.0,
        ..Default::default()
    };

    let bridged = LineageTracker::new(config(2)).unwrap().track(&track).unwrap();
    assert!(edges(&bridged).contains(&(early, late, LinkKind::GapClosing)));
    assert_eq!(bridged.lineage.track_head(late), Some(early));

    let unbridged = LineageTracker::new(config(1)).unwrap().track(&track).unwrap();
    assert_eq!(unbridged.count(LinkKind::GapClosing), 0);
    assert!(unbridged.lineage.children(early).is_empty());
    assert!(unbridged.lineage.parents(late).is_empty());
    assert!(unbridged.lineage.is_track_head(late));
}

#[test]
fn test_gap_closing_threshold_is_independent() {
    let mut track = ParentTrack::new();
    let early = point(&mut track, 0, 0.0, 0.0);
    let late = point(&mut track, 2, 3.0, 0.0);

    let config = |max_link_cost_gap_closing| TrackerConfig {
        distance_mode: DistanceMode::Center,
        max_link_cost: 100.0,
        allow_gaps: true,
        max_frame_gap: 1,
        max_link_cost_gap_closing,
        ..Default::default()
    };
    let tracker = |c| LineageTracker::new(config(c)).unwrap();

    assert!(tracker(8.0).track(&track).unwrap().lineage.parents(late).is_empty());
    assert_eq!(tracker(9.0).track(&track).unwrap().lineage.parents(late), &[early]);
}

#[test]
fn test_zero_overlap_is_never_a_link() {
    let mut track = ParentTrack::new();
    let a = boxed(&mut track, 0, 0.0, 10.0);
    let b = boxed(&mut track, 1, 50.0, 10.0);
    let c = boxed(&mut track, 2, 50.0, 10.0);

    let config = TrackerConfig {
        max_link_cost: 1.0,
        ..Default::default()
    };
    let result = LineageTracker::new(config).unwrap().track(&track).unwrap();
    assert!(result.lineage.children(a).is_empty());
    assert_eq!(result.lineage.children(b), &[c]);
    assert!(MIN_LINK_COST > 0.0);
}

#[test]
fn test_custom_overlap_source() {
    let mut track = ParentTrack::new();
    let a = track.push(DetectionBuilder::new(0).size(10.0).shape_ref(1).build());
    let b = track.push(DetectionBuilder::new(1).size(10.0).shape_ref(2).build());
    let c = track.push(DetectionBuilder::new(1).size(10.0).shape_ref(3).build());

    let table: HashMap<(u64, u64), f64> = HashMap::from([((1, 2), 2.0), ((1, 3), 9.0)]);
    let source = move |x: &Detection, y: &Detection| {
        let key = (x.shape_ref?.min(y.shape_ref?), x.shape_ref?.max(y.shape_ref?));
        table.get(&key).copied()
    };
    let tracker = LineageTracker::new(TrackerConfig::default())
        .unwrap()
        .with_overlap_source(source);

    let result = tracker.track(&track).unwrap();
    assert_eq!(result.lineage.children(a), &[c]);
    assert!(result.lineage.is_track_head(b));
}

#[test]
fn test_determinism() {
    let track = crowded_track();
    let config = TrackerConfig {
        distance_mode: DistanceMode::Center,
        max_link_cost: 60.0,
        allow_split: true,
        allow_merge: true,
        allow_gaps: true,
        max_frame_gap: 2,
        max_link_cost_gap_closing: 90.0,
        ..Default::default()
    };
    let tracker = LineageTracker::new(config).unwrap();

    let first = tracker.track(&track).unwrap();
    for _ in 0..5 {
        assert_eq!(tracker.track(&track).unwrap(), first);
    }

    let batch = BatchTracker::new(tracker.clone());
    let tracks = vec![track.clone(), track.clone(), track];
    for result in batch.track_all(&tracks) {
        assert_eq!(result.unwrap(), first);
    }
}

#[test]
fn test_frame_monotonicity_and_thresholds() {
    let track = crowded_track();
    let (max_link_cost, max_gap_cost, max_frame_gap) = (60.0, 90.0, 2);
    let config = TrackerConfig {
        distance_mode: DistanceMode::Center,
        max_link_cost,
        allow_split: true,
        allow_merge: true,
        allow_gaps: true,
        max_frame_gap,
        max_link_cost_gap_closing: max_gap_cost,
        ..Default::default()
    };
    let result = LineageTracker::new(config).unwrap().track(&track).unwrap();
    assert!(result.count(LinkKind::GapClosing) > 0);

    for (previous, next, kind) in edges(&result) {
        assert_ne!(previous, next);
        let (pf, nf) = (track.detection(previous).frame, track.detection(next).frame);
        assert!(nf > pf);
        let cost = squared_distance(&track, previous, next);
        match kind {
            LinkKind::GapClosing => {
                assert!(nf - pf - 1 <= max_frame_gap);
                assert!(cost <= max_gap_cost);
            }
            _ => {
                assert_eq!(nf, pf + 1);
                assert!(cost <= max_link_cost);
            }
        }
    }
}

#[test]
fn test_split_accounting() {
    let track = crowded_track();
    let config = TrackerConfig {
        distance_mode: DistanceMode::Center,
        max_link_cost: 500.0,
        allow_split: true,
        ..Default::default()
    };
    let result = LineageTracker::new(config).unwrap().track(&track).unwrap();

    for (id, _) in track.iter() {
        let children = result.lineage.children(id);
        if children.len() < 2 {
            continue;
        }
        assert_eq!(children.len(), 2);
        let kinds: Vec<_> = result
            .links
            .iter()
            .filter(|l| l.previous == Some(id))
            .map(|l| l.kind)
            .collect();
        assert_eq!(kinds.iter().filter(|&&k| k == LinkKind::FrameToFrame).count(), 1);
        assert_eq!(kinds.iter().filter(|&&k| k == LinkKind::Split).count(), 1);
        for &child in children {
            assert_eq!(result.lineage.parents(child), &[id]);
        }
    }
}

#[test]
fn test_no_gaps_means_no_skipped_frames() {
    let track = crowded_track();
    let config = TrackerConfig {
        allow_gaps: false,
        max_frame_gap: 3,
        ..center_config(60.0)
    };
    let result = LineageTracker::new(config).unwrap().track(&track).unwrap();
    for (previous, next, _) in edges(&result) {
        assert_eq!(
            track.detection(next).frame,
            track.detection(previous).frame + 1
        );
    }
}

#[test]
fn test_every_detection_has_a_head() {
    let track = crowded_track();
    let result = LineageTracker::new(center_config(60.0))
        .unwrap()
        .track(&track)
        .unwrap();

    assert_eq!(result.lineage.len(), track.len());
    for (id, _) in track.iter() {
        let head = result.lineage.track_head(id).unwrap();
        assert!(result.lineage.is_track_head(head));
        assert!(track.detection(head).frame <= track.detection(id).frame);
    }
    let starts = result.count(LinkKind::TrackStart);
    assert_eq!(starts, result.lineage.track_heads().len());
}

#[test]
fn test_config_from_json() {
    let config: TrackerConfig = serde_json::from_str(
        r#"{
            "distance_mode": "mass_center",
            "allow_split": true,
            "max_frame_gap": 2,
            "track_head_policy": "new_head_per_branch"
        }"#,
    )
    .unwrap();

    assert_eq!(config.distance_mode, DistanceMode::MassCenter);
    assert!(config.allow_split);
    assert_eq!(config.max_frame_gap, 2);
    assert_eq!(config.track_head_policy, TrackHeadPolicy::NewHeadPerBranch);
    assert_eq!(config.alternative_cost_factor, 1.05);

    let json = serde_json::to_string(&config).unwrap();
    let back: TrackerConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
