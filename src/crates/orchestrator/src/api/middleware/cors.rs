//! CORS middleware configuration
//!
//! Configures Cross-Origin Resource Sharing (CORS) to allow requests from
//! localhost and development environments.

use tower_http::cors::CorsLayer;

/// Create CORS layer applied to the whole API router.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}

// See `api::routes::tests::test_cors_layer_reflects_origin_on_response` for
// a request-behavior test of what this layer actually does once applied to
// the router.
