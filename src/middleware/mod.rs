pub mod auth;
pub mod context;
pub mod response;

pub use auth::authenticator_middleware;
pub use context::context_middleware;
pub use response::{ApiResponse, Empty};
