use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::services::{
    checklist::SpeciesChecklist, inference::InferenceClient, orchestrator::Identifier,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub identifier: Arc<Identifier>,
    pub inference: Arc<dyn InferenceClient>,
    pub checklist: Arc<SpeciesChecklist>,
    /// Cancelled on shutdown; every upload polls under a child of this token.
    pub shutdown: CancellationToken,
    /// Largest accepted image file, in bytes
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        identifier: Identifier,
        inference: Arc<dyn InferenceClient>,
        checklist: SpeciesChecklist,
        shutdown: CancellationToken,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            identifier: Arc::new(identifier),
            inference,
            checklist: Arc::new(checklist),
            shutdown,
            max_upload_bytes,
        }
    }
}
