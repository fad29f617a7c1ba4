use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth routes
        crate::handlers::register,
        crate::handlers::login,
        crate::handlers::get_current_user,
        // Category routes
        crate::handlers::category::list_categories,
        crate::handlers::category::create_category,
        crate::handlers::category::delete_category,
        // Server routes
        crate::handlers::server::list_servers,
        crate::handlers::server::create_server,
        crate::handlers::server::delete_server,
        crate::handlers::server::join_server,
        crate::handlers::server::leave_server,
        // Channel routes
        crate::handlers::channel::create_channel,
        crate::handlers::channel::update_channel,
        crate::handlers::channel::delete_channel,
    ),
    components(
        schemas(
            crate::error::AppError,
            // Auth
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::AuthResponse,
            crate::handlers::auth::UserResponse,
            // Category
            crate::handlers::category::CategoryResponse,
            crate::handlers::category::CreateCategoryRequest,
            // Server
            crate::handlers::server::ServerResponse,
            crate::handlers::server::CreateServerRequest,
            // Channel
            crate::handlers::channel::ChannelResponse,
            crate::handlers::channel::CreateChannelRequest,
            crate::handlers::channel::UpdateChannelRequest,
        )
    ),
    modifiers(&JwtSecurity),
    tags(
        (name = "auth", description = "Authentication operations"),
        (name = "categories", description = "Server category management"),
        (name = "servers", description = "Server listing and membership"),
        (name = "channels", description = "Channel management"),
    )
)]
pub struct ApiDoc;

/// Registers the `jwt_token` bearer scheme referenced by protected paths.
struct JwtSecurity;

impl Modify for JwtSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "jwt_token",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
