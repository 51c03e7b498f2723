/// A labeled box in model-input pixel space, top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn area(&self) -> f32 {
        (self.width.max(0) as f32) * (self.height.max(0) as f32)
    }

    /// Maps the box from `from` (width, height) pixel space into `to`.
    pub fn rescaled(&self, from: (u32, u32), to: (u32, u32)) -> Self {
        let sx = to.0 as f32 / from.0 as f32;
        let sy = to.1 as f32 / from.1 as f32;
        Self {
            x: (self.x as f32 * sx).round() as i32,
            y: (self.y as f32 * sy).round() as i32,
            width: (self.width as f32 * sx).round() as i32,
            height: (self.height as f32 * sy).round() as i32,
            class_id: self.class_id,
            label: self.label.clone(),
            confidence: self.confidence,
        }
    }
}

/// What gets reported back to the caller. The default value is the
/// "nothing detected" sentinel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn is_empty(&self) -> bool {
        self.label.is_empty()
    }

    /// The sentence handed to text-to-speech.
    pub fn announcement(&self) -> String {
        if self.is_empty() {
            return "nothing detected".to_string();
        }
        format!("{}, {:.2}% sure", self.label, self.confidence * 100.)
    }
}

impl From<&Detection> for Prediction {
    fn from(detection: &Detection) -> Self {
        Self {
            label: detection.label.clone(),
            confidence: detection.confidence,
        }
    }
}
