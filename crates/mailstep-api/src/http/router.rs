//! Axum router construction.
//!
//! Callback routes accept both `/save` and `/save/`. Anything else falls
//! through to the static configuration UI when `server.static_dir` exists.

use std::path::Path;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, header};
use axum::routing::{MethodRouter, get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use mailstep_types::config::ServerConfig;

use crate::state::AppState;

use super::handlers;

/// Largest accepted request body.
pub const BODY_LIMIT: usize = 50 * 1024 * 1024;

const HSTS: &str = "max-age=31536000; includeSubDomains; preload";
const FALLBACK_CSP: &str =
    "default-src 'self'; object-src 'none'; form-action 'self'; frame-ancestors 'self'";

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let callbacks: [(&str, MethodRouter<AppState>); 6] = [
        ("/client-credentials", post(handlers::client_credentials)),
        ("/fetch-external-key", post(handlers::fetch_external_key)),
        ("/save", post(handlers::save)),
        ("/validate", post(handlers::validate)),
        ("/publish", post(handlers::publish)),
        ("/execute", post(handlers::execute)),
    ];

    let mut router = Router::new().route("/health", get(handlers::health_check));
    for (path, method) in callbacks {
        router = router
            .route(path, method.clone())
            .route(&format!("{path}/"), method);
    }

    let static_dir = Path::new(&state.server.static_dir);
    if static_dir.is_dir() {
        router = router.fallback_service(ServeDir::new(static_dir));
    } else {
        tracing::debug!(dir = %static_dir.display(), "static directory not found, UI not served");
    }

    let csp = content_security_policy(&state.server);

    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CSP for the configuration UI, built from `server.csp` and
/// `server.frame_ancestors`.
fn content_security_policy(server: &ServerConfig) -> HeaderValue {
    fn with_self(sources: &[String]) -> String {
        let mut list = vec!["'self'"];
        list.extend(sources.iter().map(String::as_str));
        list.join(" ")
    }
    let csp = &server.csp;

    let mut directives = vec![
        "default-src 'self'".to_string(),
        format!("script-src {}", with_self(&csp.script_src)),
        format!("style-src {}", with_self(&csp.style_src)),
        format!("img-src {}", with_self(&csp.img_src)),
        format!("connect-src {}", with_self(&csp.connect_src)),
        format!("font-src {}", with_self(&csp.font_src)),
        "object-src 'none'".to_string(),
        "form-action 'self'".to_string(),
        format!("frame-ancestors {}", with_self(&server.frame_ancestors)),
    ];
    if csp.upgrade_insecure_requests {
        directives.push("upgrade-insecure-requests".to_string());
    }

    HeaderValue::from_str(&directives.join("; ")).unwrap_or_else(|_| {
        tracing::warn!("CSP sources contain invalid header characters, using the fallback policy");
        HeaderValue::from_static(FALLBACK_CSP)
    })
}
