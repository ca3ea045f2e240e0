mod calendar;
mod health;
mod middleware;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::{application::registry::FeedRegistry, config::HEALTH_PATH};

use middleware::{catch_panic, log_responses, set_request_context};

/// One `GET` route per configured calendar plus the health check.
pub fn build_router(registry: &FeedRegistry) -> Router {
    let router = registry.feeds().iter().fold(
        Router::new().route(HEALTH_PATH, get(health::healthz)),
        |router, feed| {
            router.route(
                feed.path(),
                get(calendar::serve_calendar).with_state(Arc::clone(feed)),
            )
        },
    );

    router
        .layer(axum_middleware::from_fn(catch_panic))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
