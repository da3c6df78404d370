//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use kchat_shared::time::timestamp_to_rfc3339;

use crate::{
    infrastructure::dto::http::{HealthDto, RoomDetailDto, RoomSummaryDto, UserDto, UsersDto},
    ui::state::AppState,
    usecase::GetRoomError,
};

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok".to_string(),
        phase: state.phase().to_string(),
    })
}

/// Get online participants
pub async fn get_users(State(state): State<Arc<AppState>>) -> Json<UsersDto> {
    let participants = state.get_presence_usecase.execute().await;

    // Domain Model から DTO への変換
    let users: Vec<UserDto> = participants
        .into_iter()
        .map(|p| UserDto {
            identity: p.identity.into_string(),
            connected_at: timestamp_to_rfc3339(p.connected_at.value()),
            rooms: p.rooms.into_iter().map(|room| room.into_string()).collect(),
        })
        .collect();

    Json(UsersDto {
        count: users.len(),
        users,
    })
}

/// Get list of rooms
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let rooms = state.get_rooms_usecase.list().await;

    // Domain Model から DTO への変換
    let summaries: Vec<RoomSummaryDto> = rooms
        .into_iter()
        .map(|room| RoomSummaryDto {
            member_count: room.members.len(),
            name: room.name.into_string(),
        })
        .collect();

    Json(summaries)
}

/// Get room detail by name
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    match state.get_rooms_usecase.detail(name).await {
        Ok(room) => Ok(Json(RoomDetailDto {
            name: room.name.into_string(),
            members: room
                .members
                .into_iter()
                .map(|identity| identity.into_string())
                .collect(),
        })),
        Err(GetRoomError::InvalidName(_)) => Err(StatusCode::BAD_REQUEST),
        Err(GetRoomError::NotFound(_)) => Err(StatusCode::NOT_FOUND),
    }
}
