use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use super::protocol::*;
use super::service::MembershipService;

type RpcError = (StatusCode, Json<ErrorResponse>);

fn rpc_error(status: StatusCode, error: anyhow::Error) -> RpcError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// Routes for the five membership calls, with `service` injected as an extension.
pub fn membership_router(service: Arc<MembershipService>) -> Router {
    Router::new()
        .route(ENDPOINT_JOIN, post(handle_join))
        .route(ENDPOINT_LEAVE, post(handle_leave))
        .route(ENDPOINT_PING, get(handle_ping))
        .route(ENDPOINT_INDIRECT_PING, post(handle_indirect_ping))
        .route(ENDPOINT_SYNC_MEMBERS, post(handle_sync_members))
        .layer(Extension(service))
}

pub async fn handle_join(
    Extension(service): Extension<Arc<MembershipService>>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, RpcError> {
    let node_id = req.member.node_id.clone();

    match service.handle_join(req.member).await {
        Ok(members) => Ok(Json(JoinResponse { members })),
        Err(e) => {
            tracing::error!("Failed to handle join from {}: {}", node_id, e);
            Err(rpc_error(StatusCode::BAD_REQUEST, e))
        }
    }
}

pub async fn handle_leave(
    Extension(service): Extension<Arc<MembershipService>>,
    Json(req): Json<LeaveRequest>,
) -> Json<LeaveResponse> {
    service.handle_leave(req.member).await;
    Json(LeaveResponse::default())
}

pub async fn handle_ping(
    Extension(service): Extension<Arc<MembershipService>>,
) -> Json<PingResponse> {
    Json(PingResponse {
        state: service.handle_ping().await,
    })
}

pub async fn handle_indirect_ping(
    Extension(service): Extension<Arc<MembershipService>>,
    Json(req): Json<IndirectPingRequest>,
) -> Result<Json<IndirectPingResponse>, RpcError> {
    match service
        .handle_indirect_ping(&req.node_id, &req.rpc_addr)
        .await
    {
        Ok(state) => Ok(Json(IndirectPingResponse { state })),
        Err(e) => {
            tracing::warn!("Indirect ping failed: {}", e);
            Err(rpc_error(StatusCode::BAD_GATEWAY, e))
        }
    }
}

pub async fn handle_sync_members(
    Extension(service): Extension<Arc<MembershipService>>,
    Json(req): Json<SyncMembersRequest>,
) -> Json<SyncMembersResponse> {
    let members = service.handle_sync_members(req.members).await;
    Json(SyncMembersResponse { members })
}
