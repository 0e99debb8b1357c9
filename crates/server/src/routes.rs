use axum::{
    Json,
    body::Bytes,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
};
use quiz_core::model::{
    ClearedCounts, ConsistencyStatus, DailyQidSet, OncePerDayResults, Qid, ResetScope, SyncDelta,
    SyncKey, SyncState,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use services::{SYNC_KEY_HEADER, SYNC_USER_HEADER};
use tracing::{debug, warn};

use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;

#[derive(Serialize)]
pub(crate) struct InitResponse<'a> {
    ok: bool,
    user: &'a str,
    key: &'a str,
    reissued: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QidRequest {
    qid: Qid,
}

#[derive(Serialize)]
pub(crate) struct ClearedQidResponse {
    ok: bool,
    cleared_qid: Qid,
    data: SyncState,
}

#[derive(Serialize)]
pub(crate) struct ClearedAllResponse {
    ok: bool,
    cleared: ClearedCounts,
    data: SyncState,
}

#[derive(Serialize)]
pub(crate) struct ClearedStreakResponse {
    ok: bool,
    cleared_streak3_qid: Qid,
    data: SyncState,
}

#[derive(Serialize)]
pub(crate) struct Streak3TodayResponse<'a> {
    ok: bool,
    #[serde(rename = "streak3Today")]
    streak3_today: Option<&'a DailyQidSet>,
}

#[derive(Serialize)]
pub(crate) struct OncePerDayResponse<'a> {
    ok: bool,
    #[serde(rename = "oncePerDayToday")]
    once_per_day_today: Option<&'a OncePerDayResults>,
}

#[derive(Serialize)]
pub(crate) struct DeleteResponse<'a> {
    ok: bool,
    key: &'a str,
    deleted: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QidQuery {
    #[serde(default)]
    qid: String,
}

#[derive(Serialize)]
pub(crate) struct ConsistencyItems {
    ok: bool,
    items: Vec<ConsistencyStatus>,
}

#[derive(Serialize)]
pub(crate) struct ConsistencyStored {
    ok: bool,
    stored_count: usize,
    items: Vec<ConsistencyStatus>,
}

#[derive(Serialize)]
pub(crate) struct ConsistencyDeleted<'a> {
    ok: bool,
    deleted: bool,
    qid: &'a str,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::MalformedPayload(rejection.body_text()))
}

pub(crate) async fn healthz() -> &'static str {
    "ok"
}

pub(crate) async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Parse an optional JSON object body; anything unreadable counts as absent.
fn lenient_object(body: &Bytes) -> Option<Value> {
    serde_json::from_slice::<Value>(body)
        .ok()
        .filter(Value::is_object)
}

/// The body may carry `{"force": true}`; anything else is a plain init.
pub(crate) async fn init(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    body: Bytes,
) -> Response {
    let force = lenient_object(&body).is_some_and(|body| body["force"] == Value::Bool(true));
    let key = state.sync.init(&user, force);
    let mut headers = HeaderMap::new();
    let echoed: [(&'static str, &str); 2] =
        [(SYNC_KEY_HEADER, key.as_str()), (SYNC_USER_HEADER, user.as_str())];
    for (name, value) in echoed {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => warn!(%key, header = name, "value is not header-safe, sent in body only"),
        }
    }
    let body = InitResponse {
        ok: true,
        user: user.as_str(),
        key: key.as_str(),
        reissued: force,
    };
    (headers, Json(body)).into_response()
}

pub(crate) async fn state(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let presented = headers.get(SYNC_KEY_HEADER).and_then(|v| v.to_str().ok());
    let snapshot = state.sync.state(&user, presented).await?;
    debug!(found = snapshot.found, "state served");
    Ok((
        [(CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(snapshot.state),
    )
        .into_response())
}

pub(crate) async fn merge(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<SyncDelta>, JsonRejection>,
) -> Result<Json<SyncState>, AppError> {
    let delta = json_body(payload)?;
    Ok(Json(state.sync.merge(&user, &delta).await?))
}

/// The body is optional; a missing, unreadable or unknown scope resets everything.
pub(crate) async fn reset(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    body: Bytes,
) -> Result<Json<SyncState>, AppError> {
    let request = lenient_object(&body);
    let tag = request.as_ref().and_then(|body| body["scope"].as_str());
    let scope = ResetScope::from_request_tag(tag);
    if tag.is_some_and(|tag| scope == ResetScope::All && tag.trim() != "all") {
        debug!(tag, "unrecognised reset scope, resetting everything");
    }
    Ok(Json(state.sync.reset(&user, scope).await?))
}

pub(crate) async fn reset_qid(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<QidRequest>, JsonRejection>,
) -> Result<Json<ClearedQidResponse>, AppError> {
    let QidRequest { qid } = json_body(payload)?;
    let data = state.sync.reset_qid(&user, &qid).await?;
    Ok(Json(ClearedQidResponse {
        ok: true,
        cleared_qid: qid,
        data,
    }))
}

pub(crate) async fn reset_all_qid(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<ClearedAllResponse>, AppError> {
    let (cleared, data) = state.sync.reset_all_qids(&user).await?;
    Ok(Json(ClearedAllResponse {
        ok: true,
        cleared,
        data,
    }))
}

pub(crate) async fn reset_streak3_qid(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<QidRequest>, JsonRejection>,
) -> Result<Json<ClearedStreakResponse>, AppError> {
    let QidRequest { qid } = json_body(payload)?;
    let data = state.sync.reset_streak3_qid(&user, &qid).await?;
    Ok(Json(ClearedStreakResponse {
        ok: true,
        cleared_streak3_qid: qid,
        data,
    }))
}

pub(crate) async fn reset_streak3_today(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Response, AppError> {
    let data = state.sync.reset_streak3_today(&user).await?;
    let body = Streak3TodayResponse {
        ok: true,
        streak3_today: data.streak3_today(),
    };
    Ok(Json(body).into_response())
}

pub(crate) async fn reset_once_per_day_today(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Response, AppError> {
    let data = state.sync.reset_once_per_day_today(&user).await?;
    let body = OncePerDayResponse {
        ok: true,
        once_per_day_today: data.once_per_day_today(),
    };
    Ok(Json(body).into_response())
}

pub(crate) async fn completely_delete(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Response, AppError> {
    let key = SyncKey::for_user(&user);
    let deleted = state.sync.completely_delete(&user).await?;
    let body = DeleteResponse {
        ok: true,
        key: key.as_str(),
        deleted,
    };
    Ok(Json(body).into_response())
}

pub(crate) async fn consistency_get(
    State(state): State<AppState>,
    AuthenticatedUser(_): AuthenticatedUser,
    Query(query): Query<QidQuery>,
) -> Result<Json<ConsistencyItems>, AppError> {
    let status = state.consistency.get(&query.qid).await?;
    Ok(Json(ConsistencyItems {
        ok: true,
        items: status.into_iter().collect(),
    }))
}

/// Accepts one status or an array of them.
pub(crate) async fn consistency_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ConsistencyStored>, AppError> {
    let body = json_body(payload)?;
    let items = state.consistency.store(&body).await?;
    debug!(user = %user, count = items.len(), "consistency statuses submitted");
    Ok(Json(ConsistencyStored {
        ok: true,
        stored_count: items.len(),
        items,
    }))
}

pub(crate) async fn consistency_delete(
    State(state): State<AppState>,
    AuthenticatedUser(_): AuthenticatedUser,
    Query(query): Query<QidQuery>,
) -> Result<Response, AppError> {
    let deleted = state.consistency.delete(&query.qid).await?;
    let body = ConsistencyDeleted {
        ok: true,
        deleted,
        qid: query.qid.trim(),
    };
    Ok(Json(body).into_response())
}
