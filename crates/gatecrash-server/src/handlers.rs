//! Messaging bridge route handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use gatecrash_core::site_registry::SiteRegistry;

use crate::commands::{
    AckResponse, ClearCookiesResponse, Command, SitesResponse, StatusResponse,
};
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// POST /api/message - dispatch one bridge command.
///
/// The body is parsed leniently: anything that is not a recognized
/// command yields the fixed `Unknown action` error body rather than a
/// framework-level deserialization failure.
pub async fn handle_message(
    State(state): State<AppState>,
    Json(raw): Json<Value>,
) -> Result<Response> {
    let Some(command) = Command::parse(raw) else {
        warn!("rejected unknown bridge action");
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Unknown action"})),
        )
            .into_response());
    };

    match command {
        Command::GetStatus => Ok(Json(StatusResponse {
            enabled: state.config.enabled(),
        })
        .into_response()),

        Command::Toggle => {
            let enabled = state.config.toggle()?;
            state.refresh_rules()?;
            info!(enabled, "bypass toggled");
            Ok(Json(StatusResponse { enabled }).into_response())
        }

        Command::ClearCookies { domain } => {
            SiteRegistry::validate_domain(domain.trim_start_matches('.'))
                .map_err(ApiError::BadRequest)?;
            let cleared = state.sweep_cookies(&domain);
            info!(domain = %domain, cleared, "cookie sweep");
            if let Err(err) = state.config.record_bypass() {
                warn!(error = %err, "usage counter update failed");
            }
            Ok(Json(ClearCookiesResponse {
                success: true,
                cleared,
            })
            .into_response())
        }

        Command::AddCustomSite { domain } => {
            SiteRegistry::validate_domain(&domain).map_err(ApiError::BadRequest)?;
            let added = state.config.add_custom_site(&domain)?;
            if added {
                state.refresh_rules()?;
                info!(domain = %domain, "custom site added");
            } else {
                debug!(domain = %domain, "custom site already present");
            }
            Ok(Json(AckResponse { success: added }).into_response())
        }

        Command::RemoveCustomSite { domain } => {
            let removed = state.config.remove_custom_site(&domain)?;
            if removed {
                state.refresh_rules()?;
                info!(domain = %domain, "custom site removed");
            }
            Ok(Json(AckResponse { success: removed }).into_response())
        }

        Command::GetCustomSites => Ok(Json(SitesResponse {
            sites: state.config.custom_sites(),
        })
        .into_response()),

        Command::UpdateSettings { settings } => {
            let changed = state.config.apply_settings(&settings)?;
            if changed {
                state.refresh_rules()?;
                info!("settings updated");
            }
            Ok(Json(AckResponse { success: true }).into_response())
        }
    }
}

/// GET /api/status - enabled flag, for popup polling.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        enabled: state.config.enabled(),
    })
}

/// GET /api/rules - currently installed header rules.
pub async fn get_rules(State(state): State<AppState>) -> Json<Value> {
    let rules = state.installed_rules();
    Json(json!({
        "count": rules.len(),
        "rules": rules,
    }))
}
