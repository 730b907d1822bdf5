// HTTP API

pub mod authorize;
pub mod links;

pub use authorize::{create_authorize_router, AuthorizeAppState};
pub use links::{create_links_router, LinksAppState};
