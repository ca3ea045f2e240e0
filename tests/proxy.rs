use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use futures::future::join_all;
use ical_proxy::{
    application::{
        calendar::CalendarFeed,
        origin::{FetchError, OriginClient, OriginResponse},
        registry::FeedRegistry,
    },
    domain::rules::{MatchSpec, RuleSet, RuleSpec},
    infra::http::build_router,
};
use time::{Duration, OffsetDateTime, format_description::well_known::Rfc2822};
use tower::ServiceExt;
use url::Url;

const FEED_PATH: &str = "/team.ics";

const CALENDAR: &str = "BEGIN:VCALENDAR\r\n\
    VERSION:2.0\r\n\
    BEGIN:VEVENT\r\n\
    SUMMARY:Planning\r\n\
    DESCRIPTION:internal notes\r\n\
    END:VEVENT\r\n\
    END:VCALENDAR\r\n";

const FILTERED: &str = "BEGIN:VCALENDAR\r\n\
    VERSION:2.0\r\n\
    BEGIN:VEVENT\r\n\
    SUMMARY:Planning\r\n\
    END:VEVENT\r\n\
    END:VCALENDAR\r\n";

enum Scripted {
    Respond(OriginResponse),
    Slow(OriginResponse),
    Fail,
    Panic,
}

struct FakeOrigin {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeOrigin {
    fn with(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OriginClient for FakeOrigin {
    async fn fetch(&self, _url: &Url) -> Result<OriginResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Slow(response)) => {
                let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(response)
            }
            Some(Scripted::Panic) => panic!("origin client exploded"),
            Some(Scripted::Fail) | None => Err(FetchError::transport("connection refused")),
        }
    }
}

fn response(body: &str, date: Option<OffsetDateTime>, cache_control: &str) -> OriginResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_str(cache_control).expect("header value"),
    );
    if let Some(date) = date {
        let formatted = date.format(&Rfc2822).expect("formattable date");
        headers.insert(
            header::DATE,
            HeaderValue::from_str(&formatted).expect("header value"),
        );
    }

    OriginResponse {
        headers,
        body: Bytes::from(body.to_string()),
    }
}

fn respond(body: &str, date: Option<OffsetDateTime>, cache_control: &str) -> Scripted {
    Scripted::Respond(response(body, date, cache_control))
}

fn drop_descriptions() -> RuleSet {
    RuleSet::compile(&[RuleSpec {
        matchers: vec![MatchSpec {
            scope: "name".to_string(),
            pattern: "^DESCRIPTION$".to_string(),
        }],
    }])
    .expect("valid rules")
}

fn router(origin: Arc<FakeOrigin>) -> Router {
    let feed = CalendarFeed::new(
        FEED_PATH,
        Url::parse("https://calendar.example.com/team.ics").expect("url"),
        drop_descriptions(),
        origin,
    );
    build_router(&FeedRegistry::new(vec![Arc::new(feed)]))
}

async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    app.clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn serves_filtered_calendar_with_cache_headers() {
    let origin = FakeOrigin::with(vec![respond(CALENDAR, None, "max-age=600")]);
    let app = router(origin.clone());

    let response = get(&app, FEED_PATH).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "text/calendar");
    assert_eq!(
        header_str(&response, header::CACHE_CONTROL),
        "max-age=600, public"
    );
    assert_eq!(header_str(&response, header::AGE), "0");
    assert_eq!(
        header_str(&response, header::CONTENT_LENGTH),
        FILTERED.len().to_string()
    );
    assert_eq!(body_text(response).await, FILTERED);
    assert_eq!(origin.calls(), 1);
}

#[tokio::test]
async fn fresh_cache_is_served_without_refetching() {
    let origin = FakeOrigin::with(vec![respond(CALENDAR, None, "max-age=3600")]);
    let app = router(origin.clone());

    for _ in 0..3 {
        let response = get(&app, FEED_PATH).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, FILTERED);
    }
    assert_eq!(origin.calls(), 1);
}

#[tokio::test]
async fn concurrent_requests_share_one_origin_fetch() {
    let origin = FakeOrigin::with(vec![
        Scripted::Slow(response(CALENDAR, None, "max-age=3600")),
        Scripted::Slow(response(CALENDAR, None, "max-age=3600")),
    ]);
    let app = router(origin.clone());

    let responses = join_all((0..8).map(|_| get(&app, FEED_PATH))).await;

    assert_eq!(origin.calls(), 1);
    assert_eq!(origin.peak_in_flight(), 1);
    for response in responses {
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, FILTERED);
    }
}

#[tokio::test]
async fn cold_origin_failure_is_bad_gateway() {
    let origin = FakeOrigin::with(vec![Scripted::Fail]);
    let app = router(origin.clone());

    let response = get(&app, FEED_PATH).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_text(response).await, "Bad Gateway");
}

#[tokio::test]
async fn stale_copy_is_served_when_refresh_fails() {
    let two_hours_ago = OffsetDateTime::now_utc() - Duration::hours(2);
    let origin = FakeOrigin::with(vec![
        respond(CALENDAR, Some(two_hours_ago), "max-age=60"),
        Scripted::Fail,
    ]);
    let app = router(origin.clone());

    let first = get(&app, FEED_PATH).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = get(&app, FEED_PATH).await;
    assert_eq!(second.status(), StatusCode::OK);
    let age: i64 = header_str(&second, header::AGE).parse().expect("numeric age");
    assert!(age >= 7200, "age {age}");
    assert_eq!(body_text(second).await, FILTERED);
    assert_eq!(origin.calls(), 2);
}

#[tokio::test]
async fn malformed_origin_body_keeps_previous_copy() {
    let two_hours_ago = OffsetDateTime::now_utc() - Duration::hours(2);
    let origin = FakeOrigin::with(vec![
        respond(CALENDAR, Some(two_hours_ago), "max-age=60"),
        respond("BEGIN:VCALENDAR\r\nBROKEN LINE\r\n", None, "max-age=60"),
    ]);
    let app = router(origin.clone());

    get(&app, FEED_PATH).await;
    let response = get(&app, FEED_PATH).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, FILTERED);
    assert_eq!(origin.calls(), 2);
}

#[tokio::test]
async fn refresh_starts_after_half_the_lifetime() {
    let past_half_life = OffsetDateTime::now_utc() - Duration::seconds(1900);
    let origin = FakeOrigin::with(vec![
        respond(CALENDAR, Some(past_half_life), "max-age=3600"),
        respond(CALENDAR, None, "max-age=3600"),
    ]);
    let app = router(origin.clone());

    let first = get(&app, FEED_PATH).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(origin.calls(), 1);

    let second = get(&app, FEED_PATH).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(header_str(&second, header::AGE), "0");
    assert_eq!(origin.calls(), 2);

    get(&app, FEED_PATH).await;
    assert_eq!(origin.calls(), 2);
}

#[tokio::test]
async fn panicking_handler_becomes_internal_server_error() {
    let origin = FakeOrigin::with(vec![Scripted::Panic, respond(CALENDAR, None, "max-age=60")]);
    let app = router(origin.clone());

    let response = get(&app, FEED_PATH).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Internal Server Error");

    let recovered = get(&app, FEED_PATH).await;
    assert_eq!(recovered.status(), StatusCode::OK);
    assert_eq!(body_text(recovered).await, FILTERED);
}

#[tokio::test]
async fn health_check_is_always_ok() {
    let origin = FakeOrigin::with(Vec::new());
    let app = router(origin.clone());

    let response = get(&app, "/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(origin.calls(), 0);
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let app = router(FakeOrigin::with(Vec::new()));
    let response = get(&app, "/other.ics").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
