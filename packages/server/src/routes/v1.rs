use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::screenshot;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(screenshot::save_screenshot))
        .routes(routes!(screenshot::list_screenshots))
        .routes(routes!(screenshot::download_screenshot))
}
