//! Ollama model listing

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{AppError, AppState};
use expensewise_core::ai::{ClientSettings, LlmClient, ModelInfo, Provider};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsRequest {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub ollama_base_url: Option<String>,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

/// POST /api/models - List models on Ollama Cloud or the local Ollama
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ModelsRequest>>,
) -> Result<Json<ModelsResponse>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let provider = match request.provider.as_deref() {
        Some(p) => p.parse::<Provider>().map_err(|e| AppError::bad_request(&e))?,
        None => Provider::OllamaCloud,
    };

    let settings = ClientSettings {
        provider,
        model: None,
        api_key: request.api_key,
        ollama_base_url: request.ollama_base_url,
    };

    let backend = match LlmClient::from_settings(&settings, &state.config) {
        Ok(LlmClient::Ollama(backend)) => backend,
        Ok(_) => {
            return Err(AppError::bad_request(
                "Model listing is only available for Ollama providers",
            ))
        }
        Err(e) => {
            warn!(error = %e, "Could not create Ollama client");
            return Err(AppError::internal(&e.to_string()));
        }
    };

    let models = backend.list_models().await.map_err(|e| {
        warn!(provider = %provider, error = %e, "Failed to list models");
        AppError::internal(&format!("Failed to fetch models: {}", e))
    })?;

    Ok(Json(ModelsResponse { models }))
}
