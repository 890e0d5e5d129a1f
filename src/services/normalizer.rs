use garde::Validate;
use serde::Deserialize;
use serde_json::Value;

use crate::models::detection::{Detection, IdentificationResult, RawDetection};

/// Output object of a completed inference job.
#[derive(Debug, Deserialize, Validate)]
struct RawOutput {
    #[garde(url)]
    url: String,

    #[garde(skip)]
    predictions: Predictions,
}

/// The model emits detections as a JSON-encoded string; an inline array is
/// accepted as well.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Predictions {
    Encoded(String),
    Inline(Vec<RawDetection>),
}

/// Map the terminal job payload onto the client-facing result.
///
/// The payload is third-party data influenced by user-supplied images, so it
/// is only ever bound into the expected types and validated; nothing partial
/// escapes on failure.
pub fn normalize(output: &Value) -> Result<IdentificationResult, MalformedResultError> {
    if output.is_null() {
        return Err(MalformedResultError::MissingOutput);
    }

    let raw = RawOutput::deserialize(output).map_err(MalformedResultError::Output)?;
    raw.validate()
        .map_err(|report| MalformedResultError::Invalid {
            field: "output".to_string(),
            report: report.to_string(),
        })?;

    let detections = match raw.predictions {
        Predictions::Encoded(encoded) => serde_json::from_str::<Vec<RawDetection>>(&encoded)
            .map_err(MalformedResultError::Predictions)?,
        Predictions::Inline(detections) => detections,
    };

    for (index, detection) in detections.iter().enumerate() {
        detection
            .validate()
            .map_err(|report| MalformedResultError::Invalid {
                field: format!("predictions[{index}]"),
                report: report.to_string(),
            })?;
    }

    Ok(IdentificationResult {
        url: raw.url,
        info: detections.into_iter().map(Detection::from).collect(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum MalformedResultError {
    #[error("completed job carried no output")]
    MissingOutput,

    #[error("job output does not match the expected shape: {0}")]
    Output(#[source] serde_json::Error),

    #[error("predictions are not a valid detection list: {0}")]
    Predictions(#[source] serde_json::Error),

    #[error("{field} failed validation: {report}")]
    Invalid { field: String, report: String },
}
