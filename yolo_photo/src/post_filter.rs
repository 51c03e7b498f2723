use crate::detection::Detection;

/// A stage run on decoded detections before they are reduced to a prediction.
pub trait PostFilter: Send + Sync {
    fn apply(&self, detections: Vec<Detection>) -> Vec<Detection>;
}

/// Passes detections through untouched, overlaps included.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSuppression;

impl PostFilter for NoSuppression {
    fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections
    }
}

/// Greedy per-class non-max suppression.
#[derive(Debug, Clone, Copy)]
pub struct NonMaxSuppression {
    iou_threshold: f32,
}

impl NonMaxSuppression {
    pub fn new(iou_threshold: f32) -> Self {
        Self { iou_threshold }
    }
}

fn intersection(box1: &Detection, box2: &Detection) -> f32 {
    let x1 = box1.x.max(box2.x);
    let y1 = box1.y.max(box2.y);
    let x2 = (box1.x + box1.width).min(box2.x + box2.width);
    let y2 = (box1.y + box1.height).min(box2.y + box2.height);
    ((x2 - x1).max(0) as f32) * ((y2 - y1).max(0) as f32)
}

fn union(box1: &Detection, box2: &Detection) -> f32 {
    box1.area() + box2.area() - intersection(box1, box2)
}

pub fn iou(box1: &Detection, box2: &Detection) -> f32 {
    let union = union(box1, box2);
    if union <= 0.0 {
        return 0.0;
    }
    intersection(box1, box2) / union
}

impl PostFilter for NonMaxSuppression {
    fn apply(&self, mut boxes: Vec<Detection>) -> Vec<Detection> {
        boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));

        let mut result: Vec<Detection> = Vec::new();
        for candidate in boxes {
            let suppressed = result.iter().any(|kept| {
                kept.class_id == candidate.class_id && iou(kept, &candidate) >= self.iou_threshold
            });
            if !suppressed {
                result.push(candidate);
            }
        }

        result
    }
}

pub fn from_iou_threshold(iou_threshold: Option<f32>) -> Box<dyn PostFilter> {
    match iou_threshold {
        Some(threshold) => Box::new(NonMaxSuppression::new(threshold)),
        None => Box::new(NoSuppression),
    }
}
