use crate::app_state::AppState;
use crate::config::Config;
use crate::routes;
use crate::utils::extractor::BearerOrSmartIpKeyExtractor;
use crate::{api_docs::ApiDoc, core::middleware::http_logger::http_logger};
use axum::{Router, middleware};
use http::{HeaderValue, header};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tower::ServiceBuilder;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_http::{ServiceBuilderExt, cors::CorsLayer, propagate_header::PropagateHeaderLayer};
use utoipa::OpenApi;
use utoipa::openapi::OpenApi as OpenApiDocument;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

fn compose(
    state: AppState,
    ingress: OpenApiRouter<AppState>,
    user: OpenApiRouter<AppState>,
) -> (Router, OpenApiDocument) {
    OpenApiRouter::<AppState>::with_openapi(ApiDoc::openapi())
        .nest("/health", routes::health::route::create_route())
        .nest(
            "/api/v1",
            OpenApiRouter::new().nest("/notifications", ingress.merge(user)),
        )
        .with_state(state)
        .split_for_parts()
}

/// Health check plus every `/api/v1` route, and the OpenAPI document they
/// describe. No middleware and no rate limits.
pub fn api_router(state: AppState) -> (Router, OpenApiDocument) {
    compose(
        state,
        routes::notification::route::create_ingress_route(),
        routes::notification::route::create_route(),
    )
}

/// The served application. The user routes share one limiter keyed by bearer
/// or client IP. The ingress route gets its own per-IP limiter only when
/// `INGRESS_RATE_LIMIT_PER_SEC` is set.
pub fn create_app(state: AppState, config: &Config) -> eyre::Result<Router> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(1)
            .burst_size(config.rate_limit_req_per_sec)
            .key_extractor(BearerOrSmartIpKeyExtractor::new(state.jwt.clone()))
            .finish()
            .ok_or_else(|| eyre::eyre!("Invalid rate limit configuration"))?,
    );
    let governor_limiter = governor_conf.limiter().clone();
    tokio::spawn(async move {
        loop {
            sleep(LIMITER_CLEANUP_INTERVAL).await;
            tracing::debug!("rate limiting storage size: {}", governor_limiter.len());
            governor_limiter.retain_recent();
        }
    });
    let user_routes = routes::notification::route::create_route().route_layer(GovernorLayer {
        config: governor_conf,
    });

    let mut ingress_routes = routes::notification::route::create_ingress_route();
    if let Some(per_sec) = config.ingress_rate_limit_per_sec {
        let per_sec = per_sec.max(1);
        let ingress_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_nanosecond(1_000_000_000 / u64::from(per_sec))
                .burst_size(per_sec)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| eyre::eyre!("Invalid ingress rate limit configuration"))?,
        );
        let ingress_limiter = ingress_conf.limiter().clone();
        tokio::spawn(async move {
            loop {
                sleep(LIMITER_CLEANUP_INTERVAL).await;
                ingress_limiter.retain_recent();
            }
        });
        ingress_routes = ingress_routes.route_layer(GovernorLayer {
            config: ingress_conf,
        });
    }

    let (mut router, api) = compose(state.clone(), ingress_routes, user_routes);

    if config.swagger_enabled {
        let swagger_config = utoipa_swagger_ui::Config::new(["/"]).display_request_duration(true);
        let swagger_ui = SwaggerUi::new("/swagger-ui")
            .url("/", api)
            .config(swagger_config);
        router = router.merge(swagger_ui);
    }

    let cors_layer = if let Some(whitelist) = &config.cors_origin_whitelist {
        let origins = whitelist
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_headers(tower_http::cors::Any)
            .allow_methods(tower_http::cors::Any)
            .expose_headers(tower_http::cors::Any)
            .allow_origin(origins)
    } else {
        CorsLayer::permissive()
    };

    let sensitive_headers: Arc<[_]> = vec![header::AUTHORIZATION, header::COOKIE].into();

    let middleware = ServiceBuilder::new()
        .layer(PropagateHeaderLayer::new(header::HeaderName::from_static(
            "x-request-id",
        )))
        .sensitive_request_headers(sensitive_headers.clone())
        .layer(middleware::from_fn_with_state(state, http_logger))
        .sensitive_response_headers(sensitive_headers)
        .compression()
        .layer(cors_layer);

    let router = Router::new().merge(router).layer(middleware);
    Ok(router)
}
