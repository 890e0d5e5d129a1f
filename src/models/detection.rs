use garde::Validate;
use serde::{Deserialize, Serialize};

/// Bounding box in pixel coordinates of the source image.
#[derive(Debug, Clone, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// One detection record as emitted by the YOLO model (`Results.tojson()`).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RawDetection {
    #[garde(length(min = 1, max = 200))]
    pub name: String,

    #[garde(skip)]
    pub class: u32,

    #[garde(range(min = 0.0, max = 1.0))]
    pub confidence: f64,

    #[garde(skip)]
    #[serde(rename = "box")]
    pub bounding_box: BoundingBox,
}

/// Client-facing detection: species label and confidence only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub name: String,
    pub confidence: f64,
}

impl From<RawDetection> for Detection {
    fn from(raw: RawDetection) -> Self {
        Self {
            name: raw.name,
            confidence: raw.confidence,
        }
    }
}

/// Outcome of a completed identification job.
///
/// An empty `info` means the model found no birds in the photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationResult {
    pub url: String,
    pub info: Vec<Detection>,
}
