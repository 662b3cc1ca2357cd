use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::future::Future;

tokio::task_local! {
    static REQUEST_ID: Option<String>;
}

/// Runs the rest of the stack with the request id in scope so error
/// serialization can pick it up without threading it through every
/// handler. Sits inside the layer that assigns `x-request-id`.
pub async fn with_request_id(request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    scope(id, next.run(request)).await
}

pub async fn scope<F: Future>(id: Option<String>, fut: F) -> F::Output {
    REQUEST_ID.scope(id, fut).await
}

/// The id of the request currently being served, if any.
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok().flatten()
}
