//! HTTP surface: store registration, sync triggers and status.

use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Store, StoreSyncStatus};
use crate::sync::{SyncOrchestrator, SyncRequest, SyncTrigger};
use crate::{EntityKind, ErrorKind, Platform, SyncError};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SyncOrchestrator,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-storesync"})) }))
        .route("/api/v1/stores", post(create_store))
        .route("/api/v1/stores/:id/sync", get(sync_status).post(trigger_sync))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

type ApiError = (StatusCode, String);

fn error_response(err: SyncError) -> ApiError {
    let status = match &err {
        SyncError::SyncInProgress(_) => StatusCode::CONFLICT,
        SyncError::UnsupportedPlatform(_)
        | SyncError::MissingCredentials(_)
        | SyncError::StoreInactive(_)
        | SyncError::OrganizationInactive(_) => StatusCode::UNPROCESSABLE_ENTITY,
        e if e.kind() == ErrorKind::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStoreRequest {
    pub organization_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub platform: Platform,
    #[validate(url)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Recorded on the automatic sync's audit entries.
    pub actor_id: Option<Uuid>,
}

async fn create_store(State(s): State<AppState>, Json(r): Json<CreateStoreRequest>) -> Result<(StatusCode, Json<Store>), ApiError> {
    r.validate().map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let repos = s.orchestrator.repositories();
    repos.organizations.find_organization(r.organization_id).await.map_err(error_response)?
        .ok_or_else(|| error_response(SyncError::OrganizationNotFound(r.organization_id)))?;

    let store = Store::create(r.organization_id, r.name.trim(), r.platform, r.base_url.trim_end_matches('/'), r.api_key.trim(), r.api_secret.trim());
    repos.stores.insert_store(&store).await.map_err(error_response)?;
    tracing::info!(store_id = %store.id, organization_id = %store.organization_id, platform = %store.platform, "Store registered");

    if store.can_sync() {
        let actor = r.actor_id.unwrap_or(Uuid::nil());
        let request = SyncRequest::new(store.id, store.organization_id, actor, SyncTrigger::Automatic);
        if let Err(err) = s.orchestrator.start(request).await {
            tracing::warn!(store_id = %store.id, error = %err, "Automatic sync not started");
        }
    }
    Ok((StatusCode::CREATED, Json(store)))
}

#[derive(Debug, Deserialize)]
pub struct TriggerSyncRequest {
    pub organization_id: Uuid,
    pub actor_id: Uuid,
    #[serde(default)]
    pub entity_types: Option<Vec<EntityKind>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncAccepted {
    pub store_id: Uuid,
    pub entity_types: Vec<EntityKind>,
}

async fn trigger_sync(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<TriggerSyncRequest>) -> Result<(StatusCode, Json<SyncAccepted>), ApiError> {
    let entity_types = EntityKind::canonical(r.entity_types.as_deref());
    let request = SyncRequest { store_id: id, organization_id: r.organization_id, actor_id: r.actor_id, entity_types: r.entity_types, trigger: SyncTrigger::Manual };
    // The run continues in the background; its result goes to the audit trail.
    s.orchestrator.start(request).await.map_err(error_response)?;
    Ok((StatusCode::ACCEPTED, Json(SyncAccepted { store_id: id, entity_types })))
}

async fn sync_status(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<StoreSyncStatus>, ApiError> {
    s.orchestrator.sync_status(id).await.map(Json).map_err(error_response)
}
