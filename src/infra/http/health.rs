use axum::http::StatusCode;

pub(super) async fn healthz() -> StatusCode {
    StatusCode::OK
}
