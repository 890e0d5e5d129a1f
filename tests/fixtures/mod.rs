//! Canned inference service responses

use serde_json::{json, Value};

/// Smallest byte string `image::guess_format` recognises as PNG.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR\x00\x00\x00\x01";

/// URL the stub inference service reports for the annotated image.
pub const ANNOTATED_URL: &str = "https://cdn.example.com/annotated/job-1.png";

/// A detection record in the shape YOLO's `tojson()` emits.
pub fn detection(name: &str, confidence: f64) -> Value {
    json!({
        "name": name,
        "class": 7,
        "confidence": confidence,
        "box": {"x1": 12.0, "y1": 40.5, "x2": 310.0, "y2": 288.25}
    })
}

pub fn pending(status: &str) -> Value {
    json!({"id": "job-1", "status": status})
}

pub fn completed(detections: Vec<Value>) -> Value {
    json!({
        "id": "job-1",
        "status": "COMPLETED",
        "output": {
            "url": ANNOTATED_URL,
            "predictions": Value::Array(detections).to_string()
        }
    })
}

pub fn failed(reason: &str) -> Value {
    json!({"id": "job-1", "status": "FAILED", "error": reason})
}

/// Species list used for the checklist routes.
pub const CHECKLIST_CSV: &str = "Mallard,American Coot,Snowy Egret,Black Phoebe,Anna's Hummingbird\n";
