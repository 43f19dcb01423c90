//! Service banner for `/`.

use axum::response::IntoResponse;

// Kept outside the OpenAPI document on purpose; it exists for humans and
// load balancers poking the root path.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
