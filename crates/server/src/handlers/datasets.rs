//! Dataset catalog endpoints.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{bind_json, succeed, Empty, Envelope};
use crate::state::AppState;
use axum::extract::{Path, Query, Request, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use urchin_core::{new_dataset_id, unix_now, Dataset, DatasetPatch, ReplicaState};
use urchin_metadata::{DatasetRepo, ListQuery, MetadataStore};

#[derive(Debug, Deserialize)]
pub struct CreateDatasetRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub replica: u32,
    #[serde(default)]
    pub cache_strategy: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateDatasetPayload {
    pub dataset_id: String,
}

/// POST /api/v1/dataset - create a dataset.
pub async fn create_dataset(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Envelope<CreateDatasetPayload>>> {
    let body: CreateDatasetRequest = bind_json(req).await?;

    Dataset::validate_name(&body.name)?;
    Dataset::validate_tags(&body.tags)?;

    // A zero replica request falls back to a single replica.
    let replica = if body.replica == 0 { 1 } else { body.replica };
    state.controller.validate_replica(replica).await?;

    let now = unix_now();
    let dataset = Dataset {
        id: new_dataset_id(),
        name: body.name,
        desc: body.desc,
        replica,
        cache_strategy: body.cache_strategy,
        tags: body.tags,
        share_blob_sources: Vec::new(),
        share_blob_caches: Vec::new(),
        replica_state: ReplicaState::NoScale,
        create_time: now,
        update_time: now,
        extra: Default::default(),
    };
    state.store.create_dataset(&dataset).await?;

    tracing::info!(dataset_id = %dataset.id, name = %dataset.name, "dataset created");
    Ok(succeed(CreateDatasetPayload {
        dataset_id: dataset.id,
    }))
}

#[derive(Debug, Serialize)]
pub struct DatasetPayload {
    pub dataset: Dataset,
}

/// GET /api/v1/dataset/{id} - fetch one dataset.
pub async fn get_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<DatasetPayload>>> {
    let dataset = state.store.get_dataset(&id).await?;
    Ok(succeed(DatasetPayload { dataset }))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDatasetRequest {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub replica: Option<u32>,
    pub cache_strategy: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// PATCH /api/v1/dataset/{id} - partially update a dataset.
///
/// A replica change enters the controller's scale workflow; everything
/// else is a plain field patch. `share_blob_sources`/`share_blob_caches`
/// are never bound from the request — the cache list is controller-owned.
pub async fn update_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Request,
) -> ApiResult<Json<Envelope<Empty>>> {
    let body: UpdateDatasetRequest = bind_json(req).await?;

    if let Some(name) = &body.name {
        Dataset::validate_name(name)?;
    }
    if let Some(tags) = &body.tags {
        Dataset::validate_tags(tags)?;
    }

    let patch = DatasetPatch {
        name: body.name,
        desc: body.desc,
        replica: body.replica,
        cache_strategy: body.cache_strategy,
        tags: body.tags,
        share_blob_sources: None,
        share_blob_caches: None,
    };
    state.controller.update_dataset(&id, patch).await?;
    Ok(succeed(Empty {}))
}

#[derive(Debug, Serialize)]
pub struct DatasetsPayload {
    pub datasets: Vec<Dataset>,
}

fn parse_param<T: FromStr>(
    params: &HashMap<String, String>,
    name: &str,
    default: T,
) -> ApiResult<T> {
    match params.get(name) {
        None => Ok(default),
        Some(raw) if raw.is_empty() => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::InvalidParameter(format!("query parameter {name}: {raw:?}"))),
    }
}

/// GET /api/v1/datasets - paged, filtered listing.
pub async fn list_datasets(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Envelope<DatasetsPayload>>> {
    let query = ListQuery {
        page_index: parse_param(&params, "page_index", 0)?,
        page_size: parse_param(&params, "page_size", 10)?,
        search_key: params.get("search_key").cloned().unwrap_or_default(),
        order_by: params.get("order_by").cloned().unwrap_or_default(),
        sort_by: parse_param(&params, "sort_by", 1)?,
        created_at_less: parse_param(&params, "created_at_less", 0)?,
        created_at_greater: parse_param(&params, "created_at_greater", 0)?,
    };
    if query.page_size <= 0 {
        return Err(ApiError::InvalidParameter(format!(
            "page_size {} must be positive",
            query.page_size
        )));
    }
    if query.page_index < 0 {
        return Err(ApiError::InvalidParameter(format!(
            "page_index {} must not be negative",
            query.page_index
        )));
    }

    let datasets = state.store.list_datasets(&query).await?;
    Ok(succeed(DatasetsPayload { datasets }))
}

/// DELETE /api/v1/dataset/{id} - delete a dataset with its versions,
/// indexes and replica directory.
pub async fn delete_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<Empty>>> {
    state.store.delete_dataset(&id).await?;
    tracing::info!(dataset_id = %id, "dataset deleted");
    Ok(succeed(Empty {}))
}
