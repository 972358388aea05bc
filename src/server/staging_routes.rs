//! Review API: the thin HTTP surface operators use to review, approve,
//! reject and promote staged albums (§4.10).

use super::session::AdminSession;
use super::state::{GuardedPromotionEngine, ServerState};
use crate::review_store::{ReviewError, SqliteReviewStore, StagingItem, StagingStatus};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/staging", get(list_staging_items))
        .route("/staging/stats", get(staging_stats))
        .route("/staging/{id}", get(get_staging_item))
        .route("/staging/{id}", delete(delete_staging_item))
        .route("/staging/{id}/approve", post(approve_staging_item))
        .route("/staging/{id}/reject", post(reject_staging_item))
        .route("/staging/{id}/promote", post(promote_staging_item))
}

#[derive(Debug, Serialize)]
pub struct StagingItemDto {
    pub id: String,
    pub scan_id: String,
    pub group_id: String,
    pub staged_path: String,
    pub sidecar_path: String,
    pub artist: String,
    pub album: String,
    pub year: Option<i32>,
    pub track_count: u32,
    pub total_size_bytes: u64,
    pub status: StagingStatus,
    pub processed_at: i64,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<i64>,
    pub reviewer_notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<StagingItem> for StagingItemDto {
    fn from(item: StagingItem) -> Self {
        Self {
            id: item.id,
            scan_id: item.scan_id,
            group_id: item.group_id,
            staged_path: item.staged_path,
            sidecar_path: item.sidecar_path,
            artist: item.artist_display,
            album: item.album_display,
            year: item.year,
            track_count: item.track_count,
            total_size_bytes: item.total_size_bytes,
            status: item.status,
            processed_at: item.processed_at,
            reviewer_id: item.reviewer_id,
            reviewed_at: item.reviewed_at,
            reviewer_notes: item.reviewer_notes,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<StagingStatus>,
}

async fn list_staging_items(
    _session: AdminSession,
    State(review): State<SqliteReviewStore>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StagingItemDto>>, ApiError> {
    let items = review.list(query.status)?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

async fn get_staging_item(
    _session: AdminSession,
    State(review): State<SqliteReviewStore>,
    Path(id): Path<String>,
) -> Result<Json<StagingItemDto>, ApiError> {
    let item = review.get(&id)?.ok_or_else(|| ApiError::NotFound(id.clone()))?;
    Ok(Json(item.into()))
}

#[derive(Debug, Deserialize, Default)]
pub struct ApproveRequest {
    pub notes: Option<String>,
}

async fn approve_staging_item(
    session: AdminSession,
    State(promotion): State<GuardedPromotionEngine>,
    Path(id): Path<String>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<StagingItemDto>, ApiError> {
    let notes = body.and_then(|Json(b)| b.notes);
    let item = promotion.approve(&id, &session.operator, notes.as_deref())?;
    Ok(Json(item.into()))
}

#[derive(Debug, Deserialize, Default)]
pub struct RejectRequest {
    #[serde(default)]
    pub delete_files: bool,
    pub notes: Option<String>,
}

async fn reject_staging_item(
    session: AdminSession,
    State(promotion): State<GuardedPromotionEngine>,
    Path(id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> Result<Json<StagingItemDto>, ApiError> {
    let RejectRequest { delete_files, notes } = body.map(|Json(b)| b).unwrap_or_default();
    let item = promotion.reject(&id, &session.operator, notes.as_deref(), delete_files)?;
    Ok(Json(item.into()))
}

async fn promote_staging_item(
    _session: AdminSession,
    State(promotion): State<GuardedPromotionEngine>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    promotion.promote(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_staging_item(
    _session: AdminSession,
    State(promotion): State<GuardedPromotionEngine>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    promotion.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct StagingStatsDto {
    pub pending_review: usize,
    pub approved: usize,
    pub rejected: usize,
    pub promoted: usize,
}

async fn staging_stats(
    _session: AdminSession,
    State(review): State<SqliteReviewStore>,
) -> Result<Json<StagingStatsDto>, ApiError> {
    Ok(Json(StagingStatsDto {
        pending_review: review.list(Some(StagingStatus::PendingReview))?.len(),
        approved: review.list(Some(StagingStatus::Approved))?.len(),
        rejected: review.list(Some(StagingStatus::Rejected))?.len(),
        promoted: review.list(Some(StagingStatus::Promoted))?.len(),
    }))
}

pub enum ApiError {
    NotFound(String),
    Review(ReviewError),
    Promotion(crate::promotion::PromotionError),
}

impl From<ReviewError> for ApiError {
    fn from(e: ReviewError) -> Self {
        ApiError::Review(e)
    }
}

impl From<crate::promotion::PromotionError> for ApiError {
    fn from(e: crate::promotion::PromotionError) -> Self {
        ApiError::Promotion(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(id) => (StatusCode::NOT_FOUND, format!("no staging item {id}")),
            ApiError::Review(ReviewError::UnknownItem(id)) => (StatusCode::NOT_FOUND, format!("no staging item {id}")),
            ApiError::Review(e @ ReviewError::InvalidStateTransition { .. }) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Review(e @ ReviewError::ConcurrentUpdate(_)) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Review(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Promotion(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, message).into_response()
    }
}
