//! Mapping schema documentation endpoint.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};

use crate::AppState;

/// `GET /schema`: the rule set the relay maps leads with.
pub async fn get_schema(State(state): State<AppState>) -> Response {
    Json(state.mapper.schema()).into_response()
}
