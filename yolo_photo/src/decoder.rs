use crate::{
    detection::Detection,
    error::{DetectError, Result},
    labels::LabelSet,
};
use ndarray::{ArrayView2, Axis};
use serde::Deserialize;

const BOX_VALUES: usize = 4;

/// How candidates are laid out in the flat output buffer.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// `(4 + classes, candidates)`: attribute `k` of candidate `j` sits at
    /// `k * candidates + j`. This is what YOLOv8 exports as `output0`.
    #[default]
    AttributeMajor,
    /// `(candidates, 4 + classes)`: one contiguous row per candidate.
    CandidateMajor,
}

#[derive(Debug, Clone)]
pub struct DetectionDecoder {
    num_classes: usize,
    layout: OutputLayout,
    confidence_threshold: f32,
    score_scale: f32,
}

impl DetectionDecoder {
    pub fn new(
        num_classes: usize,
        layout: OutputLayout,
        confidence_threshold: f32,
        score_scale: f32,
    ) -> Self {
        Self {
            num_classes,
            layout,
            confidence_threshold,
            score_scale,
        }
    }

    fn num_attributes(&self) -> usize {
        BOX_VALUES + self.num_classes
    }

    /// Views the flat buffer as one row per candidate.
    fn candidates<'a>(&self, raw: &'a [f32]) -> Result<ArrayView2<'a, f32>> {
        let num_attributes = self.num_attributes();
        if raw.len() % num_attributes != 0 {
            return Err(DetectError::Inference(format!(
                "output has {} values, not a multiple of {} attributes",
                raw.len(),
                num_attributes
            )));
        }
        let num_candidates = raw.len() / num_attributes;

        let view = match self.layout {
            OutputLayout::AttributeMajor => {
                ArrayView2::from_shape((num_attributes, num_candidates), raw)
                    .map(|v| v.reversed_axes())
            }
            OutputLayout::CandidateMajor => {
                ArrayView2::from_shape((num_candidates, num_attributes), raw)
            }
        };

        view.map_err(|e| DetectError::Inference(format!("invalid output shape: {}", e)))
    }

    /// Keeps every candidate whose best class score exceeds the scaled
    /// threshold, in candidate order. NaN scores never win the argmax and
    /// confidences are capped at 1. Overlapping boxes are not merged here.
    pub fn decode(&self, raw: &[f32], labels: &LabelSet) -> Result<Vec<Detection>> {
        let candidates = self.candidates(raw)?;
        let min_score = self.confidence_threshold * self.score_scale;

        let mut detections = Vec::new();
        for row in candidates.axis_iter(Axis(0)) {
            let Some((class_id, score)) = row
                .iter()
                .skip(BOX_VALUES)
                .copied()
                .enumerate()
                .filter(|(_, value)| !value.is_nan())
                .reduce(|accum, item| if item.1 > accum.1 { item } else { accum })
            else {
                continue;
            };

            if !(score > min_score) {
                continue;
            }

            let label = labels.get(class_id)?;
            let (xc, yc, w, h) = (row[0], row[1], row[2], row[3]);

            detections.push(Detection {
                x: (xc - w / 2.).round() as i32,
                y: (yc - h / 2.).round() as i32,
                width: w.round() as i32,
                height: h.round() as i32,
                class_id,
                label: label.to_string(),
                confidence: (score / self.score_scale).min(1.0),
            });
        }

        tracing::debug!(
            "Decoded {} detections from {} candidates",
            detections.len(),
            candidates.nrows()
        );

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUM_CLASSES: usize = 80;
    const NUM_CANDIDATES: usize = 8400;

    fn coco_like_labels(n: usize) -> LabelSet {
        LabelSet::new((0..n).map(|i| format!("class{}", i)).collect())
    }

    /// Builds an attribute-major buffer and lets the caller set values by
    /// (candidate, attribute).
    fn attribute_major(num_candidates: usize, set: &[(usize, usize, f32)]) -> Vec<f32> {
        let mut raw = vec![0.0; (BOX_VALUES + NUM_CLASSES) * num_candidates];
        for &(candidate, attribute, value) in set {
            raw[attribute * num_candidates + candidate] = value;
        }
        raw
    }

    #[test]
    fn test_all_zero_output_is_empty() {
        let raw = vec![0.0; (BOX_VALUES + NUM_CLASSES) * NUM_CANDIDATES];
        let labels = coco_like_labels(NUM_CLASSES);

        for threshold in [0.0, 0.01, 0.5, 1.0] {
            let decoder =
                DetectionDecoder::new(NUM_CLASSES, OutputLayout::AttributeMajor, threshold, 1.0);
            assert!(decoder.decode(&raw, &labels).unwrap().is_empty());
        }
    }

    #[test]
    fn test_single_candidate_on_percent_scale() {
        let raw = attribute_major(
            NUM_CANDIDATES,
            &[
                (123, 0, 320.0),
                (123, 1, 240.0),
                (123, 2, 100.0),
                (123, 3, 60.0),
                (123, BOX_VALUES + 4, 95.0),
                (123, BOX_VALUES + 2, 30.0),
            ],
        );
        let decoder = DetectionDecoder::new(NUM_CLASSES, OutputLayout::AttributeMajor, 0.5, 100.0);

        let detections = decoder.decode(&raw, &coco_like_labels(NUM_CLASSES)).unwrap();

        assert_eq!(detections.len(), 1);
        let detection = &detections[0];
        assert_eq!(detection.class_id, 4);
        assert_eq!(detection.label, "class4");
        assert!((detection.confidence - 0.95).abs() < 1e-6);
        assert_eq!(
            (detection.x, detection.y, detection.width, detection.height),
            (270, 210, 100, 60)
        );
    }

    #[test]
    fn test_score_equal_to_threshold_is_dropped() {
        let raw = attribute_major(4, &[(0, BOX_VALUES, 0.5), (1, BOX_VALUES + 1, 0.51)]);
        let decoder = DetectionDecoder::new(NUM_CLASSES, OutputLayout::AttributeMajor, 0.5, 1.0);

        let detections = decoder.decode(&raw, &coco_like_labels(NUM_CLASSES)).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 1);
    }

    #[test]
    fn test_candidate_major_layout() {
        let num_classes = 3;
        let mut raw = vec![0.0; 2 * (BOX_VALUES + num_classes)];
        // second candidate, contiguous row
        raw[7..14].copy_from_slice(&[50.0, 50.0, 20.0, 10.0, 0.1, 0.2, 0.9]);
        let decoder = DetectionDecoder::new(num_classes, OutputLayout::CandidateMajor, 0.25, 1.0);

        let detections = decoder.decode(&raw, &coco_like_labels(num_classes)).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 2);
        assert_eq!((detections[0].x, detections[0].y), (40, 45));
    }

    #[test]
    fn test_every_class_index_resolves_with_matching_labels() {
        let set: Vec<_> = (0..NUM_CLASSES)
            .map(|class_id| (class_id, BOX_VALUES + class_id, 0.9))
            .collect();
        let raw = attribute_major(NUM_CLASSES, &set);
        let decoder = DetectionDecoder::new(NUM_CLASSES, OutputLayout::AttributeMajor, 0.5, 1.0);

        let detections = decoder.decode(&raw, &coco_like_labels(NUM_CLASSES)).unwrap();

        assert_eq!(detections.len(), NUM_CLASSES);
        for (class_id, detection) in detections.iter().enumerate() {
            assert_eq!(detection.label, format!("class{}", class_id));
        }
    }

    #[test]
    fn test_short_label_set_is_out_of_range() {
        let raw = attribute_major(16, &[(3, BOX_VALUES + 10, 0.9)]);
        let decoder = DetectionDecoder::new(NUM_CLASSES, OutputLayout::AttributeMajor, 0.5, 1.0);

        let result = decoder.decode(&raw, &coco_like_labels(5));

        assert!(matches!(
            result,
            Err(DetectError::LabelIndexOutOfRange { index: 10, len: 5 })
        ));
    }

    #[test]
    fn test_nan_scores_never_pass_the_threshold() {
        let raw = attribute_major(
            3,
            &[
                (0, BOX_VALUES, f32::NAN),
                (0, BOX_VALUES + 1, 0.1),
                (0, BOX_VALUES + 2, 0.2),
                (1, BOX_VALUES, f32::NAN),
                (1, BOX_VALUES + 1, 0.9),
                (2, BOX_VALUES + 3, f32::NAN),
            ],
        );
        let decoder = DetectionDecoder::new(NUM_CLASSES, OutputLayout::AttributeMajor, 0.5, 1.0);

        let detections = decoder.decode(&raw, &coco_like_labels(NUM_CLASSES)).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 1);
        assert!((detections[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_scores_above_scale_are_capped_at_one() {
        let raw = attribute_major(2, &[(0, BOX_VALUES + 4, 95.0)]);
        let decoder = DetectionDecoder::new(NUM_CLASSES, OutputLayout::AttributeMajor, 0.5, 1.0);

        let detections = decoder.decode(&raw, &coco_like_labels(NUM_CLASSES)).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 1.0);
    }

    #[test]
    fn test_ragged_output_is_inference_error() {
        let decoder = DetectionDecoder::new(NUM_CLASSES, OutputLayout::AttributeMajor, 0.5, 1.0);
        let result = decoder.decode(&[0.0; 85], &coco_like_labels(NUM_CLASSES));
        assert!(matches!(result, Err(DetectError::Inference(_))));
    }
}
