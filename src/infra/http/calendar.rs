use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    application::{calendar::CalendarFeed, error::HttpError},
    cache::CachedCalendar,
};

const CALENDAR_CONTENT_TYPE: &str = "text/calendar";

pub(super) async fn serve_calendar(
    State(feed): State<Arc<CalendarFeed>>,
) -> Result<Response, HttpError> {
    match feed.serve().await {
        Some(calendar) => Ok(calendar_response(calendar)),
        None => Err(HttpError::new(
            "infra::http::serve_calendar",
            StatusCode::BAD_GATEWAY,
            "Bad Gateway",
            format!(
                "no cached copy of `{}` and origin `{}` could not be refreshed",
                feed.path(),
                feed.origin()
            ),
        )
        .for_feed(feed.path(), feed.origin())),
    }
}

fn calendar_response(calendar: CachedCalendar) -> Response {
    // An origin clock ahead of ours yields a negative age; `Age` must not go below zero.
    let age = calendar.age.max(0);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CALENDAR_CONTENT_TYPE.to_string()),
            (header::AGE, age.to_string()),
            (
                header::CACHE_CONTROL,
                format!("max-age={}, public", calendar.max_age),
            ),
            (header::CONTENT_LENGTH, calendar.body.len().to_string()),
        ],
        calendar.body,
    )
        .into_response()
}
