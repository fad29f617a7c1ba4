use crate::error::{AppError, AppResult};
use crate::middleware::auth::current_user;
use crate::middleware::AuthUser;
use crate::models::{ChannelModel, ChannelName};
use crate::services::channel::ChannelService;
use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A channel with every stored field.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChannelResponse {
    pub id: i32,
    /// Lower-cased channel name
    pub name: String,
    /// Owner user ID
    pub owner: i32,
    pub topic: String,
    /// Parent server ID
    pub server: i32,
}

impl From<ChannelModel> for ChannelResponse {
    fn from(c: ChannelModel) -> Self {
        Self {
            id: c.id,
            name: c.name,
            owner: c.owner_id,
            topic: c.topic,
            server: c.server_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateChannelRequest {
    /// Channel name (1-100 characters), stored lower-cased
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Channel topic (max 100 characters)
    #[validate(length(max = 100))]
    pub topic: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateChannelRequest {
    /// New name, stored lower-cased
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    /// New topic
    #[validate(length(max = 100))]
    pub topic: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/servers/{id}/channels",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Server ID")),
    request_body = CreateChannelRequest,
    responses(
        (status = 201, description = "Channel created", body = ChannelResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Not the server owner", body = AppError),
        (status = 404, description = "Server not found", body = AppError),
    ),
    tag = "channels"
)]
pub async fn create_channel(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(server_id): Path<i32>,
    Json(payload): Json<CreateChannelRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let actor = current_user(&db, &auth_user).await?;
    let channel = ChannelService::new(db)
        .create(
            server_id,
            &actor,
            ChannelName::new(&payload.name),
            &payload.topic,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ChannelResponse::from(channel))))
}

#[utoipa::path(
    put,
    path = "/api/v1/channels/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Channel ID")),
    request_body = UpdateChannelRequest,
    responses(
        (status = 200, description = "Channel updated", body = ChannelResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Not allowed to manage this channel", body = AppError),
        (status = 404, description = "Channel not found", body = AppError),
    ),
    tag = "channels"
)]
pub async fn update_channel(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateChannelRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let actor = current_user(&db, &auth_user).await?;
    let channel = ChannelService::new(db)
        .update(
            id,
            &actor,
            payload.name.as_deref().map(ChannelName::new),
            payload.topic,
        )
        .await?;

    Ok(Json(ChannelResponse::from(channel)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/channels/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Channel ID")),
    responses(
        (status = 204, description = "Channel deleted"),
        (status = 403, description = "Not allowed to manage this channel", body = AppError),
        (status = 404, description = "Channel not found", body = AppError),
    ),
    tag = "channels"
)]
pub async fn delete_channel(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let actor = current_user(&db, &auth_user).await?;
    ChannelService::new(db).delete(id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
