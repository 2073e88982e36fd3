pub mod accept;
pub mod render;

pub use accept::{parse_accept_header, AcceptHeader, AcceptHeaders, MediaType, MediaTypeParams};
pub use render::{RenderType, Renderer};
