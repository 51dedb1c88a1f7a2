//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, statistics};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sightline API",
        version = "1.0.0",
        description = "Biodiversity observation statistics REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // User statistics
        statistics::species_count,
        statistics::area_species_count,
    ),
    components(
        schemas(
            crate::models::UserStatisticsItem,
            crate::models::AreaType,
            crate::models::PagedUserStatistics,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "user-statistics", description = "Per-user observation statistics")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
