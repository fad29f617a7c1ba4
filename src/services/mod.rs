pub mod auth;
pub mod category;
pub mod channel;
pub mod server;
pub mod server_query;
