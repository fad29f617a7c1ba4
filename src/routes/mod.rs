use crate::handlers;
use crate::middleware::auth::{auth_middleware, optional_auth_middleware};
use axum::{middleware, routing, Router};

pub fn create_routes() -> Router {
    Router::new().nest("/api/v1", api_routes())
}

fn api_routes() -> Router {
    auth_routes()
        .merge(public_read_routes())
        .merge(protected_routes().layer(middleware::from_fn(auth_middleware)))
}

/// Auth routes: register, login.
fn auth_routes() -> Router {
    Router::new()
        .route("/auth/register", routing::post(handlers::register))
        .route("/auth/login", routing::post(handlers::login))
}

/// Public reads. A bearer token is honoured when present, which is what
/// `by_serverid` needs.
fn public_read_routes() -> Router {
    Router::new()
        .route("/servers", routing::get(handlers::server::list_servers))
        .route("/servers/", routing::get(handlers::server::list_servers))
        .route(
            "/categories",
            routing::get(handlers::category::list_categories),
        )
        .layer(middleware::from_fn(optional_auth_middleware))
}

/// Protected routes: all authenticated writes.
fn protected_routes() -> Router {
    Router::new()
        // Auth
        .route("/auth/me", routing::get(handlers::get_current_user))
        // Categories (admin only - checked in handler)
        .route(
            "/categories",
            routing::post(handlers::category::create_category),
        )
        .route(
            "/categories/{id}",
            routing::delete(handlers::category::delete_category),
        )
        // Servers
        .route("/servers", routing::post(handlers::server::create_server))
        .route(
            "/servers/{id}",
            routing::delete(handlers::server::delete_server),
        )
        .route(
            "/servers/{id}/members",
            routing::post(handlers::server::join_server).delete(handlers::server::leave_server),
        )
        // Channels
        .route(
            "/servers/{id}/channels",
            routing::post(handlers::channel::create_channel),
        )
        .route(
            "/channels/{id}",
            routing::put(handlers::channel::update_channel)
                .delete(handlers::channel::delete_channel),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Extension,
    };
    use sea_orm::DatabaseConnection;
    use tower::ServiceExt;

    // Every case below is rejected before the database is touched.
    fn app() -> Router {
        create_routes().layer(Extension(DatabaseConnection::Disconnected))
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn by_user_requires_login() {
        let (status, body) = send(get("/api/v1/servers?by_user=true")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn by_serverid_requires_login_even_when_malformed() {
        let (status, _) = send(get("/api/v1/servers?by_serverid=abc")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_numeric_qty_is_bad_request() {
        let (status, body) = send(get("/api/v1/servers/?qty=abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Please specify a positive integer quantity.");
    }

    #[tokio::test]
    async fn writes_require_a_token() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/servers")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"x","category":1}"#))
            .unwrap();
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
