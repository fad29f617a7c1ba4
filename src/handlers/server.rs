use crate::error::{AppError, AppResult};
use crate::handlers::channel::ChannelResponse;
use crate::middleware::auth::current_user;
use crate::middleware::AuthUser;
use crate::models::ServerModel;
use crate::services::server::{ServerListing, ServerService};
use crate::services::server_query::{self, ServerListRequest};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A server with its channels. Members are never included.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServerResponse {
    pub id: i32,
    pub name: String,
    /// Owner user ID
    pub owner: i32,
    /// Category ID
    pub category: i32,
    pub description: Option<String>,
    /// Channels of this server
    pub channel_server: Vec<ChannelResponse>,
    /// Member count; `null` unless `with_num_members=true` was requested
    pub num_numbers: Option<i64>,
}

impl From<ServerListing> for ServerResponse {
    fn from(listing: ServerListing) -> Self {
        let ServerListing {
            server,
            channels,
            num_members,
        } = listing;
        Self {
            channel_server: channels.into_iter().map(ChannelResponse::from).collect(),
            num_numbers: num_members,
            ..ServerResponse::from(server)
        }
    }
}

impl From<ServerModel> for ServerResponse {
    fn from(s: ServerModel) -> Self {
        Self {
            id: s.id,
            name: s.name,
            owner: s.owner_id,
            category: s.category_id,
            description: s.description,
            channel_server: Vec::new(),
            num_numbers: None,
        }
    }
}

/// Raw query string of `GET /servers`. Values are interpreted by the query
/// composer, not by serde, so malformed input surfaces as a 400 with a
/// readable message.
#[derive(Debug, Default, Deserialize)]
pub struct ServerListQuery {
    pub category: Option<String>,
    pub with_num_members: Option<String>,
    pub qty: Option<String>,
    pub by_user: Option<String>,
    pub by_serverid: Option<String>,
}

impl From<ServerListQuery> for ServerListRequest {
    fn from(q: ServerListQuery) -> Self {
        ServerListRequest::from_raw(
            q.category,
            q.with_num_members,
            q.qty,
            q.by_user,
            q.by_serverid,
        )
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateServerRequest {
    /// Server name (1-100 characters)
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Category ID
    pub category: i32,
    /// Description (max 250 characters)
    #[validate(length(max = 250))]
    pub description: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/servers",
    params(
        ("category" = Option<String>, Query, description = "Categories of server to retrieve (name or ID)"),
        ("with_num_members" = Option<bool>, Query, description = "Attach the member count as `num_numbers`"),
        ("qty" = Option<u64>, Query, description = "Return at most this many servers"),
        ("by_user" = Option<bool>, Query, description = "Membership filter; currently refused with 401 for every caller"),
        ("by_serverid" = Option<i32>, Query, description = "Only the server with this ID (login required)"),
    ),
    responses(
        (status = 200, description = "Servers matching the filters", body = Vec<ServerResponse>),
        (status = 400, description = "Invalid or unknown server ID, or invalid quantity", body = AppError),
        (status = 401, description = "by_user requested, or by_serverid without login", body = AppError),
    ),
    tag = "servers"
)]
pub async fn list_servers(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: Option<AuthUser>,
    Query(params): Query<ServerListQuery>,
) -> AppResult<impl IntoResponse> {
    let request = ServerListRequest::from(params);
    let criteria = server_query::compose(&request, auth_user.map(|u| u.user_id))?;

    let listings = ServerService::new(db).list(&criteria).await?;
    if let Some(raw) = &request.by_serverid {
        if listings.is_empty() {
            return Err(not_found_server(raw));
        }
    }

    let response: Vec<ServerResponse> = listings.into_iter().map(ServerResponse::from).collect();
    Ok(Json(response))
}

/// Echoes the id exactly as the client sent it.
fn not_found_server(raw_id: &str) -> AppError {
    AppError::Validation(format!("Server with ID {} not found.", raw_id))
}

#[utoipa::path(
    post,
    path = "/api/v1/servers",
    security(("jwt_token" = [])),
    request_body = CreateServerRequest,
    responses(
        (status = 201, description = "Server created, caller is the owner", body = ServerResponse),
        (status = 400, description = "Validation error or unknown category", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "servers"
)]
pub async fn create_server(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<CreateServerRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let server = ServerService::new(db)
        .create(
            auth_user.user_id,
            payload.category,
            &payload.name,
            payload.description,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ServerResponse::from(server))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/servers/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Server ID")),
    responses(
        (status = 204, description = "Server and its channels deleted"),
        (status = 403, description = "Owner or admin only", body = AppError),
        (status = 404, description = "Server not found", body = AppError),
    ),
    tag = "servers"
)]
pub async fn delete_server(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let actor = current_user(&db, &auth_user).await?;
    ServerService::new(db).delete(id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/servers/{id}/members",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Server ID")),
    responses(
        (status = 204, description = "Caller is a member"),
        (status = 404, description = "Server not found", body = AppError),
    ),
    tag = "servers"
)]
pub async fn join_server(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    ServerService::new(db).join(id, auth_user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/v1/servers/{id}/members",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Server ID")),
    responses(
        (status = 204, description = "Caller is no longer a member"),
        (status = 404, description = "Server not found", body = AppError),
    ),
    tag = "servers"
)]
pub async fn leave_server(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    ServerService::new(db).leave(id, auth_user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelModel;

    fn server() -> ServerModel {
        ServerModel {
            id: 1,
            name: "Gamers".to_string(),
            owner_id: 10,
            category_id: 2,
            description: None,
        }
    }

    #[test]
    fn member_count_is_null_when_not_requested() {
        let json = serde_json::to_value(ServerResponse::from(ServerListing {
            server: server(),
            channels: vec![],
            num_members: None,
        }))
        .unwrap();
        assert!(json.get("num_numbers").unwrap().is_null());
        assert!(json.get("members").is_none());
        assert_eq!(json["owner"], 10);
        assert_eq!(json["category"], 2);
    }

    #[test]
    fn listing_nests_channels_and_count() {
        let json = serde_json::to_value(ServerResponse::from(ServerListing {
            server: server(),
            channels: vec![ChannelModel {
                id: 5,
                name: "lobby".to_string(),
                owner_id: 10,
                topic: "hi".to_string(),
                server_id: 1,
            }],
            num_members: Some(2),
        }))
        .unwrap();
        assert_eq!(json["num_numbers"], 2);
        assert_eq!(json["channel_server"][0]["name"], "lobby");
        assert_eq!(json["channel_server"][0]["server"], 1);
    }

    #[test]
    fn not_found_message_keeps_the_raw_id() {
        match not_found_server("007") {
            AppError::Validation(msg) => assert_eq!(msg, "Server with ID 007 not found."),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn query_string_maps_onto_request() {
        let request = ServerListRequest::from(ServerListQuery {
            category: Some("gaming".into()),
            with_num_members: Some("true".into()),
            qty: Some("3".into()),
            by_user: Some("false".into()),
            by_serverid: Some(String::new()),
        });
        assert_eq!(request.category.as_deref(), Some("gaming"));
        assert!(request.with_num_members);
        assert!(!request.by_user);
        assert_eq!(request.by_serverid, None);
    }
}
