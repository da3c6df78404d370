//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthDto {
    pub status: String,
    pub phase: String,
}

/// One online participant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserDto {
    pub identity: String,
    pub connected_at: String,
    pub rooms: Vec<String>,
}

/// `GET /api/users`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsersDto {
    pub count: usize,
    pub users: Vec<UserDto>,
}

/// `GET /api/rooms` item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSummaryDto {
    pub name: String,
    pub member_count: usize,
}

/// `GET /api/rooms/{name}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomDetailDto {
    pub name: String,
    pub members: Vec<String>,
}
