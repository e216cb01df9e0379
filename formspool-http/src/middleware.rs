use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// A form page served from a public origin that posts to a server on a
/// private address triggers a Private Network Access preflight carrying
/// `Access-Control-Request-Private-Network: true`; answer it.
pub async fn allow_private_network(request: Request, next: Next) -> Response {
    let asked = request
        .headers()
        .contains_key("access-control-request-private-network");
    let mut response = next.run(request).await;
    if asked {
        response.headers_mut().insert(
            "access-control-allow-private-network",
            HeaderValue::from_static("true"),
        );
    }
    response
}
