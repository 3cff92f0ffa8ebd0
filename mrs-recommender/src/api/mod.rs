//! HTTP API handlers

pub mod extraction;
pub mod health;
pub mod recommendation;
pub mod status;

pub use extraction::extraction_routes;
pub use health::health_routes;
pub use recommendation::recommendation_routes;
pub use status::status_routes;
