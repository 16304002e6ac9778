use crate::shared::bounding_box::{BoundingBox, DetectionSet};

/// Greedy area-first reduction of pooled detections to one box per face.
///
/// Boxes are visited largest first; a box is dropped when more than
/// `threshold` of its own area lies inside an already kept box. Larger
/// boxes therefore win over the fragments several passes tend to produce.
pub fn merge_overlapping(boxes: &[BoundingBox], threshold: f64) -> DetectionSet {
    let mut pool: Vec<BoundingBox> = boxes.iter().filter(|b| !b.is_empty()).copied().collect();
    // Stable sort keeps the merge deterministic for equal areas
    pool.sort_by(|a, b| b.area().cmp(&a.area()));

    let mut kept: DetectionSet = Vec::with_capacity(pool.len());
    for candidate in pool {
        let covered = kept
            .iter()
            .any(|k| candidate.overlap_ratio(k) > threshold);
        if !covered {
            kept.push(candidate);
        }
    }
    kept
}
