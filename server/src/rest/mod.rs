// Receituario
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Entry point to the REST server.

use crate::driver::Driver;
use crate::model::PrescriptionId;
use axum::Router;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use log::info;
use receituario_core::rest::{RestError, RestResult};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

mod counter_next_post;
mod counter_preview_get;
mod health_get;
mod prescription_delete;
mod prescription_get;
mod prescription_put;
mod prescriptions_get;
mod prescriptions_post;
mod ratelimit;
pub(crate) use ratelimit::RateLimiter;
#[cfg(test)]
mod testutils;

/// Maximum size of the request bodies accepted by the server.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Headers added to every response unless the handler already set them.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("content-security-policy", "default-src 'self'; frame-ancestors 'self'; object-src 'none'"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Parses the prescription identifier `raw` taken from a request path.
///
/// Identifiers that cannot name any prescription are reported as missing.
fn parse_prescription_id(raw: &str) -> RestResult<PrescriptionId> {
    raw.parse::<i64>().map(PrescriptionId::new).map_err(|_| RestError::NotFound)
}

/// Logs every request once it has been served.
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let start = Instant::now();
    let response = next.run(request).await;
    info!(
        "{} {} {} - {} ms",
        method,
        path,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );

    response
}

/// Rejects the request if its client exceeded its quota.
async fn limit_rate(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    match limiter.account(ip).await {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// Creates the CORS policy that accepts `allowed_origins`, or any origin if empty.
fn cors(allowed_origins: Vec<HeaderValue>) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(allowed_origins)
    };
    CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any)
}

/// Wraps `router` so that all of its responses carry the `SECURITY_HEADERS`.
fn with_security_headers(mut router: Router) -> Router {
    for (name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(*name),
            HeaderValue::from_static(*value),
        ));
    }
    router
}

/// Creates the router for the application.
pub(crate) fn app(
    driver: Driver,
    limiter: Arc<RateLimiter>,
    allowed_origins: Vec<HeaderValue>,
) -> Router {
    use axum::routing::{get, post};
    let router = Router::new()
        .route("/health", get(health_get::handler))
        .route("/counter/preview", get(counter_preview_get::handler))
        .route("/counter/next", post(counter_next_post::handler))
        .route(
            "/prescriptions",
            get(prescriptions_get::handler).post(prescriptions_post::handler),
        )
        .route(
            "/prescriptions/:id",
            get(prescription_get::handler)
                .put(prescription_put::handler)
                .delete(prescription_delete::handler),
        )
        .with_state(driver)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(log_request))
                .layer(cors(allowed_origins))
                .layer(middleware::from_fn_with_state(limiter, limit_rate))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        );
    with_security_headers(router)
}
