use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, Uri},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use service_core::error::AppError;
use std::net::SocketAddr;
use tower_sessions::Session;

use crate::models::{
    Account, AccountDto, AccountLog, AccountParameter, AccountStatsList, AccountStatus,
};
use crate::services::{AccountError, CallerContext, RequestContext};
use crate::startup::AppState;

const INVALID_LICENSE: &str = "Invalid License";

/// Answer for unknown account uuids.
fn no_account() -> AccountDto {
    AccountDto {
        id: Some(1),
        status: AccountStatus::Canceled,
        status_date: Some(Utc::now()),
        status_description: Some(INVALID_LICENSE.to_string()),
        ..Default::default()
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountCheckQuery {
    /// Client diagnostics string.
    pub info: Option<String>,
    /// Hardware fingerprint of the calling installation.
    pub uuid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterQuery {
    pub default_value: Option<String>,
}

/// First hop of `X-Forwarded-For`, else the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Record the check. A failed write never fails the check itself.
async fn record_check(state: &AppState, account: &Account, log: AccountLog) {
    if let Err(e) = state.repository.add_log(log).await {
        tracing::warn!(account_id = account.id, error = %e, "Cannot record account check");
    }
}

/// License check polled by remote installations.
#[tracing::instrument(skip(state, query, headers, uri, peer), fields(account_uuid = %uuid))]
pub async fn get_account(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Query(query): Query<AccountCheckQuery>,
    headers: HeaderMap,
    uri: Uri,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Json<AccountDto>, AppError> {
    let Some(account) = state.repository.find_by_uuid(&uuid).await? else {
        tracing::info!("Remote check for unknown account");
        return Ok(Json(no_account()));
    };

    tracing::info!(
        account_id = account.id,
        client_info = query.info.as_deref().unwrap_or("-"),
        "Remote account check"
    );
    let log = AccountLog::new(account.id, "Remote account check")
        .with_ip_address(client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)))
        .with_path_info(uri.path())
        .with_client_info(query.info.clone());
    record_check(&state, &account, log).await;

    let mut dto = account.to_dto();
    if dto.required_instance_uuid {
        let matches = match (query.uuid.as_deref(), dto.instance_uuid.as_deref()) {
            (Some(given), Some(expected)) => given.eq_ignore_ascii_case(expected),
            _ => false,
        };
        if !matches {
            tracing::warn!(account_id = account.id, "Instance uuid mismatch");
            dto.status = AccountStatus::New;
            dto.status_description = Some(INVALID_LICENSE.to_string());
        }
    }
    Ok(Json(dto))
}

/// Stats push from remote installations.
#[tracing::instrument(skip(state, stats), fields(account_uuid = %uuid, count = stats.data.len()))]
pub async fn update_stats(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Json(stats): Json<AccountStatsList>,
) -> Result<String, AppError> {
    let Some(account) = state.repository.find_by_uuid(&uuid).await? else {
        return Ok(format!("Cannot found account with uuid: {}", uuid));
    };

    state.repository.update_stats(account.id, stats.data).await?;
    tracing::info!(account_id = account.id, "Account stats updated");
    Ok("DONE: Account stats updated".to_string())
}

/// Stored account parameter. A missing parameter is created from
/// `defaultValue` when one is given. Unknown accounts read as empty.
#[tracing::instrument(skip(state, query), fields(account_uuid = %uuid))]
pub async fn get_parameter(
    State(state): State<AppState>,
    Path((uuid, name)): Path<(String, String)>,
    Query(query): Query<ParameterQuery>,
) -> Result<String, AppError> {
    let Some(account) = state.repository.find_by_uuid(&uuid).await? else {
        return Ok(String::new());
    };

    if let Some(parameter) = state.repository.find_parameter(account.id, &name).await? {
        return Ok(parameter.value.unwrap_or_default());
    }

    let Some(default) = query.default_value else {
        return Ok(String::new());
    };
    state
        .repository
        .save_parameter(AccountParameter::new(account.id, &name, &default))
        .await?;
    tracing::info!(account_id = account.id, parameter = %name, "Account parameter created");
    Ok(default)
}

/// Tenant of the calling session.
#[tracing::instrument(skip_all)]
pub async fn current_account(
    State(state): State<AppState>,
    session: Session,
    ctx: RequestContext,
) -> Result<Json<AccountDto>, AppError> {
    state
        .service
        .current_account(CallerContext::new(&ctx, &session))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No account for this request")))
}

/// Switch the session to another account.
///
/// The caller must be authenticated and may only select the account it
/// belongs to.
#[tracing::instrument(skip(state, session, ctx))]
pub async fn select_account(
    State(state): State<AppState>,
    session: Session,
    ctx: RequestContext,
    Path(account_id): Path<i64>,
) -> Result<Json<AccountDto>, AppError> {
    let Some(principal) = ctx.principal_account_id else {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Authentication required to select an account"
        )));
    };
    if principal != account_id {
        tracing::warn!(principal, account_id, "Rejected switch to a foreign account");
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Account {} is not accessible",
            account_id
        )));
    }

    let dto = state
        .service
        .set_current_account(CallerContext::new(&ctx, &session), account_id)
        .await?
        .ok_or(AccountError::NotFound(account_id))?;
    Ok(Json(dto))
}
