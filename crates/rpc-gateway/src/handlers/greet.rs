//! `GreetService` handler.

use crate::middleware::{CurrentPrincipal, JsonBody};
use crate::models::{GreetRequest, GreetResponse};
use axum::Json;
use tracing::instrument;

/// Handler for POST /api.v1.GreetService/Greet
///
/// Echoes the caller's greeting along with the authenticated principal.
#[instrument(skip_all, name = "gateway.greet")]
pub async fn greet(
    CurrentPrincipal(principal): CurrentPrincipal,
    JsonBody(req): JsonBody<GreetRequest>,
) -> Json<GreetResponse> {
    let principal_id = principal.id().to_string();

    Json(GreetResponse {
        msg: greeting(&req.greet.name, &req.greet.id, &principal_id, principal.role()),
    })
}

fn greeting(name: &str, id: &str, principal_id: &str, role: &str) -> String {
    format!("Hello, {name} ({id}). I see that your ID is {principal_id} and your role is {role}")
}
