use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use recon_resolution::{
    conflicting_occurrences, occurrences_in_scope, resolution_stats, resolutions_by_status,
    resolutions_for_occurrence, ResolutionStats, ResolutionWithEndpoints,
};
use recon_store::{ResolutionStatus, Store};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;

/// Query parameters for `GET /corrections/`. `status` is accepted as a
/// comma-separated list (`status=0,1`) rather than a repeated query key —
/// plain `serde_urlencoded`, which axum's `Query` extractor uses, has no
/// multi-value support.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub scope_id: Option<u64>,
    #[serde(default)]
    pub search_occurrence: String,
    #[serde(default)]
    pub search_correct: String,
    pub status: Option<String>,
    #[serde(default)]
    pub conflicts_only: Option<u8>,
    pub sort_by: Option<String>,
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub resolutions: Vec<ResolutionView>,
    pub stats: ResolutionStats,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

#[derive(Debug, Serialize)]
pub struct ResolutionView {
    pub id: u64,
    pub scope_id: u64,
    pub occurrence_value: String,
    pub canonical_entity_value: String,
    pub status: u8,
    pub score: f64,
    pub manual: bool,
}

impl From<ResolutionWithEndpoints> for ResolutionView {
    fn from(r: ResolutionWithEndpoints) -> Self {
        ResolutionView {
            id: r.resolution.id,
            scope_id: r.resolution.scope_id,
            occurrence_value: r.occurrence.value,
            canonical_entity_value: r.canonical_entity.value,
            status: r.resolution.status.as_u8(),
            score: r.resolution.score,
            manual: r.resolution.manual,
        }
    }
}

fn parse_statuses(raw: &Option<String>) -> ServerResult<Vec<ResolutionStatus>> {
    let Some(raw) = raw else { return Ok(vec![]) };
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim()
                .parse::<u8>()
                .ok()
                .and_then(ResolutionStatus::from_u8)
                .ok_or_else(|| ServerError::BadRequest(format!("invalid status value: {s}")))
        })
        .collect()
}

/// `GET /corrections/` — filtered, paginated list of resolutions.
pub async fn list_resolutions<S: Store + 'static>(
    State(state): State<Arc<ServerState<S>>>,
    Query(query): Query<ListQuery>,
) -> ServerResult<Json<ListResponse>> {
    let statuses = parse_statuses(&query.status)?;
    let conflicts_only = query.conflicts_only == Some(1);
    let page = query.page.unwrap_or(1).max(1);
    let page_size = state.config.page_size;

    let rows = state.store.transaction(|txn| {
        let scope_ids = match query.scope_id {
            Some(id) => vec![id],
            None => txn.list_scopes()?.into_iter().map(|s| s.id).collect(),
        };

        let mut rows: Vec<ResolutionWithEndpoints> = Vec::new();
        for scope_id in scope_ids {
            if conflicts_only {
                let conflicts = conflicting_occurrences(txn, scope_id)
                    .map_err(|e| recon_store::StoreError::backend(e.to_string()))?;
                rows.extend(conflicts.into_iter().flat_map(|(_, r)| r));
            } else if statuses.len() == 1 {
                rows.extend(
                    resolutions_by_status(txn, scope_id, Some(statuses[0]))
                        .map_err(|e| recon_store::StoreError::backend(e.to_string()))?,
                );
            } else {
                let all = resolutions_by_status(txn, scope_id, None)
                    .map_err(|e| recon_store::StoreError::backend(e.to_string()))?;
                rows.extend(
                    all.into_iter()
                        .filter(|r| statuses.is_empty() || statuses.contains(&r.resolution.status)),
                );
            }
        }
        Ok(rows)
    })?;

    let mut rows: Vec<ResolutionWithEndpoints> = rows
        .into_iter()
        .filter(|r| {
            (query.search_occurrence.is_empty()
                || r.occurrence.value.contains(&query.search_occurrence))
                && (query.search_correct.is_empty()
                    || r.canonical_entity.value.contains(&query.search_correct))
        })
        .collect();

    match query.sort_by.as_deref() {
        Some("score") => rows.sort_by(|a, b| a.resolution.score.total_cmp(&b.resolution.score)),
        Some("-score") | None => {
            rows.sort_by(|a, b| b.resolution.score.total_cmp(&a.resolution.score))
        }
        Some("created_at") => rows.sort_by(|a, b| a.resolution.created_at.cmp(&b.resolution.created_at)),
        Some("-created_at") => rows.sort_by(|a, b| b.resolution.created_at.cmp(&a.resolution.created_at)),
        Some(other) => {
            return Err(ServerError::BadRequest(format!("unsupported sort_by: {other}")))
        }
    }

    let total_pages = rows.len().div_ceil(page_size).max(1);
    let start = (page - 1) * page_size;
    let page_rows: Vec<ResolutionView> = rows
        .into_iter()
        .skip(start)
        .take(page_size)
        .map(ResolutionView::from)
        .collect();

    let stats = if let Some(scope_id) = query.scope_id {
        state
            .store
            .transaction(|txn| {
                resolution_stats(txn, scope_id)
                    .map_err(|e| recon_store::StoreError::backend(e.to_string()))
            })?
    } else {
        ResolutionStats::default()
    };

    Ok(Json(ListResponse {
        resolutions: page_rows,
        stats,
        page,
        page_size,
        total_pages,
    }))
}

#[derive(Debug, Serialize)]
pub struct EditView {
    pub resolution: ResolutionView,
    pub related_resolutions: Vec<ResolutionView>,
}

/// `GET /corrections/{id}/edit/` — a resolution plus its siblings for the
/// same occurrence.
pub async fn get_resolution<S: Store + 'static>(
    State(state): State<Arc<ServerState<S>>>,
    Path(id): Path<u64>,
) -> ServerResult<Json<EditView>> {
    let (resolution, related) = state.store.transaction(|txn| {
        let resolution = txn
            .get_resolution(id)?
            .ok_or(recon_store::StoreError::ResolutionNotFound(id))?;
        let occurrence = txn
            .get_occurrence(resolution.occurrence_id)?
            .ok_or(recon_store::StoreError::OccurrenceNotFound(resolution.occurrence_id))?;
        let canonical_entity = txn
            .get_canonical_entity(resolution.canonical_entity_id)?
            .ok_or(recon_store::StoreError::CanonicalEntityNotFound(
                resolution.canonical_entity_id,
            ))?;
        let related = resolutions_for_occurrence(txn, resolution.occurrence_id)
            .map_err(|e| recon_store::StoreError::backend(e.to_string()))?;
        Ok((
            ResolutionWithEndpoints {
                resolution,
                occurrence,
                canonical_entity,
            },
            related,
        ))
    })?;

    Ok(Json(EditView {
        resolution: resolution.into(),
        related_resolutions: related.into_iter().map(ResolutionView::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct EditAction {
    pub action: String,
    pub status: Option<u8>,
}

/// `POST /corrections/{id}/edit/` — mutate a resolution's status. Every
/// action marks `manual=true`; a successful mutation redirects (302) back
/// to the list.
pub async fn post_resolution_edit<S: Store + 'static>(
    State(state): State<Arc<ServerState<S>>>,
    Path(id): Path<u64>,
    Form(body): Form<EditAction>,
) -> ServerResult<Response> {
    match body.action.as_str() {
        "approve" => {
            state
                .store
                .transaction(|txn| {
                    recon_resolution::set_status(txn, id, ResolutionStatus::Approved, true)
                        .map_err(|e| recon_store::StoreError::backend(e.to_string()))
                })
                .map_err(map_not_found)?;
        }
        "invalidate" => {
            state
                .store
                .transaction(|txn| {
                    recon_resolution::set_status(txn, id, ResolutionStatus::Invalid, true)
                        .map_err(|e| recon_store::StoreError::backend(e.to_string()))
                })
                .map_err(map_not_found)?;
        }
        "delete" => {
            state
                .store
                .transaction(|txn| {
                    recon_resolution::delete(txn, id)
                        .map_err(|e| recon_store::StoreError::backend(e.to_string()))
                })
                .map_err(map_not_found)?;
        }
        "change_status" => {
            let status = body
                .status
                .and_then(ResolutionStatus::from_u8)
                .ok_or_else(|| ServerError::BadRequest("missing or invalid status".to_string()))?;
            state
                .store
                .transaction(|txn| {
                    recon_resolution::set_status(txn, id, status, true)
                        .map_err(|e| recon_store::StoreError::backend(e.to_string()))
                })
                .map_err(map_not_found)?;
        }
        other => return Err(ServerError::BadRequest(format!("unknown action: {other}"))),
    }

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, "/corrections/".to_string())],
    )
        .into_response())
}

fn map_not_found(err: recon_store::StoreError) -> ServerError {
    match err {
        recon_store::StoreError::ResolutionNotFound(id) => {
            ServerError::Resolution(recon_resolution::ResolutionError::NotFound(id))
        }
        other => ServerError::Store(other),
    }
}
