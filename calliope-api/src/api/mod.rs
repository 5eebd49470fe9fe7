//! HTTP API handlers for calliope-api

pub mod auth;
pub mod authors;
pub mod books;
pub mod comments;
pub mod extract;
pub mod formats;
pub mod genres;
pub mod health;
pub mod payments;
pub mod publishers;
pub mod publishings;
pub mod response;
pub mod users;

pub use auth::{auth_middleware, AuthUser};
pub use authors::author_routes;
pub use books::book_routes;
pub use comments::comment_routes;
pub use formats::format_routes;
pub use genres::genre_routes;
pub use health::health_routes;
pub use payments::payment_routes;
pub use publishers::publisher_routes;
pub use publishings::publishing_routes;
pub use response::ApiResponse;
pub use users::user_routes;
