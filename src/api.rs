//! Axum REST API handlers.
//!
//! Caller identity arrives from the auth collaborator as `x-user-id` /
//! `x-user-role` headers; this layer only translates HTTP to ledger calls
//! and ledger errors back to status codes.  The donation settle/fail/expire
//! endpoints are the payment-gateway callback boundary.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::aggregate::{self, CampaignSummary};
use crate::campaigns::{self, CampaignUpdate, NewCampaign};
use crate::donations::{self, NewDonation};
use crate::errors::{LedgerError, Result};
use crate::lifecycle;
use crate::models::{unix_now, Caller, Campaign, Donation, DonationStatus, Role, Withdrawal};
use crate::verify::{self, Check, ChecklistEntry};
use crate::withdrawals::{self, NewWithdrawal};

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct CampaignResponse {
    pub campaign: Campaign,
    pub summary: CampaignSummary,
}

#[derive(Serialize)]
pub struct CampaignListResponse {
    pub count: usize,
    pub campaigns: Vec<Campaign>,
}

#[derive(Serialize)]
pub struct DonationListResponse {
    pub count: usize,
    pub donations: Vec<Donation>,
}

#[derive(Serialize)]
pub struct WithdrawalListResponse {
    pub count: usize,
    pub withdrawals: Vec<Withdrawal>,
}

#[derive(Serialize)]
pub struct ChecklistResponse {
    pub campaign_id: i64,
    pub all_pass: bool,
    pub items: Vec<ChecklistEntry>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_checks: Option<Vec<Check>>,
}

#[derive(Deserialize)]
pub struct SettleBody {
    /// Raw gateway status string; normalised case-insensitively.
    pub status: String,
    #[serde(default)]
    pub fee: i64,
}

#[derive(Deserialize)]
pub struct ReasonBody {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct ProofBody {
    pub proof_url: String,
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            LedgerError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            LedgerError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            LedgerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            LedgerError::ConflictingStatus(_) => (StatusCode::CONFLICT, "conflicting_status"),
            LedgerError::InsufficientFunds { .. } => (StatusCode::CONFLICT, "insufficient_funds"),
            LedgerError::IncompleteVerification(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "incomplete_verification")
            }
            LedgerError::Database(_) | LedgerError::Migrate(_) | LedgerError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        let failing_checks = match &self {
            LedgerError::IncompleteVerification(items) => Some(items.clone()),
            _ => None,
        };
        (
            status,
            Json(serde_json::json!(ErrorResponse {
                kind,
                error: self.to_string(),
                failing_checks,
            })),
        )
            .into_response()
    }
}

/// Resolve the acting caller from the auth collaborator's headers.
fn caller(headers: &HeaderMap) -> Result<Caller> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LedgerError::Forbidden("missing x-user-id header".into()))?;
    let role = match headers.get("x-user-role").and_then(|v| v.to_str().ok()) {
        Some(r) if r.eq_ignore_ascii_case("admin") => Role::Admin,
        _ => Role::User,
    };
    Ok(Caller {
        user_id: user_id.to_string(),
        role,
    })
}

// ─────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─────────────────────────────────────────────────────────
// Campaigns
// ─────────────────────────────────────────────────────────

/// `POST /campaigns` — create a draft owned by the caller.
pub async fn create_campaign(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(input): Json<NewCampaign>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    let campaign = campaigns::create_draft(&state.pool, &caller, input, unix_now()).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// `GET /campaigns`
pub async fn list_campaigns(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse> {
    let campaigns = campaigns::list(&state.pool, unix_now()).await?;
    Ok(Json(CampaignListResponse {
        count: campaigns.len(),
        campaigns,
    }))
}

/// `GET /campaigns/:id` — campaign plus its recomputed financial summary.
pub async fn get_campaign(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let now = unix_now();
    let campaign = campaigns::get(&state.pool, id, now).await?;
    let summary = aggregate::summary(&state.pool, &campaign, now).await?;
    Ok(Json(CampaignResponse { campaign, summary }))
}

/// `GET /campaigns/slug/:slug`
pub async fn get_campaign_by_slug(
    State(state): State<Arc<ApiState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let now = unix_now();
    let campaign = campaigns::get_by_slug(&state.pool, &slug, now).await?;
    let summary = aggregate::summary(&state.pool, &campaign, now).await?;
    Ok(Json(CampaignResponse { campaign, summary }))
}

/// `GET /campaigns/:id/summary` — reporting read.
pub async fn get_campaign_summary(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let now = unix_now();
    let campaign = campaigns::get(&state.pool, id, now).await?;
    let summary = aggregate::summary(&state.pool, &campaign, now).await?;
    Ok(Json(summary))
}

/// `PATCH /campaigns/:id`
pub async fn update_campaign(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(patch): Json<CampaignUpdate>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    let campaign = campaigns::update(&state.pool, &caller, id, patch, unix_now()).await?;
    Ok(Json(campaign))
}

/// `DELETE /campaigns/:id` — cascades to donations and withdrawals.
pub async fn delete_campaign(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    campaigns::delete(&state.pool, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /campaigns/:id/checklist` — itemized verification state.
pub async fn get_checklist(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let campaign = campaigns::get(&state.pool, id, unix_now()).await?;
    let items = verify::checklist(&campaign);
    Ok(Json(ChecklistResponse {
        campaign_id: campaign.id,
        all_pass: items.iter().all(|i| i.passed),
        items,
    }))
}

// ─────────────────────────────────────────────────────────
// Campaign lifecycle actions
// ─────────────────────────────────────────────────────────

/// `POST /campaigns/:id/submit`
pub async fn submit_campaign(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    Ok(Json(lifecycle::submit(&state.pool, &caller, id, unix_now()).await?))
}

/// `POST /campaigns/:id/approve` — verification gate must pass.
pub async fn approve_campaign(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    Ok(Json(lifecycle::approve(&state.pool, &caller, id, unix_now()).await?))
}

/// `POST /campaigns/:id/reject`
pub async fn reject_campaign(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ReasonBody>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    Ok(Json(lifecycle::reject(&state.pool, &caller, id, body.reason, unix_now()).await?))
}

/// `POST /campaigns/:id/pause`
pub async fn pause_campaign(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    Ok(Json(lifecycle::pause(&state.pool, &caller, id, unix_now()).await?))
}

/// `POST /campaigns/:id/resume`
pub async fn resume_campaign(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    Ok(Json(lifecycle::resume(&state.pool, &caller, id, unix_now()).await?))
}

/// `POST /campaigns/:id/finish`
pub async fn finish_campaign(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    Ok(Json(lifecycle::finish(&state.pool, &caller, id, unix_now()).await?))
}

// ─────────────────────────────────────────────────────────
// Donations
// ─────────────────────────────────────────────────────────

/// `POST /campaigns/:id/donations` — initiate a donation (no auth needed;
/// anonymous donors are allowed).
pub async fn create_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(input): Json<NewDonation>,
) -> Result<impl IntoResponse> {
    let donation = donations::create(&state.pool, id, input, unix_now()).await?;
    Ok((StatusCode::CREATED, Json(donation)))
}

/// `GET /campaigns/:id/donations` — the public list: settled set only.
pub async fn list_campaign_donations(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    campaigns::fetch(&state.pool, id).await?;
    let donations = donations::list_valid_for_campaign(&state.pool, id).await?;
    Ok(Json(DonationListResponse {
        count: donations.len(),
        donations,
    }))
}

/// `GET /users/:id/donations` — a donor's own history (all statuses).
pub async fn list_user_donations(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    if !caller.is_admin() && caller.user_id != user_id {
        return Err(LedgerError::Forbidden(
            "donation history is visible only to its owner".into(),
        ));
    }
    let donations = donations::list_for_user(&state.pool, &user_id).await?;
    Ok(Json(DonationListResponse {
        count: donations.len(),
        donations,
    }))
}

/// `POST /donations/:id/settle` — payment-gateway confirmation callback.
pub async fn settle_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(body): Json<SettleBody>,
) -> Result<impl IntoResponse> {
    let status = DonationStatus::parse_gateway(&body.status).ok_or_else(|| {
        LedgerError::InvalidInput(format!("unknown gateway status '{}'", body.status))
    })?;
    Ok(Json(donations::mark_settled(&state.pool, id, status, body.fee, unix_now()).await?))
}

/// `POST /donations/:id/fail` — payment-gateway failure callback.
pub async fn fail_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(donations::mark_failed(&state.pool, id).await?))
}

/// `POST /donations/:id/expire` — checkout expired without payment.
pub async fn expire_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(donations::mark_expired(&state.pool, id).await?))
}

// ─────────────────────────────────────────────────────────
// Withdrawals
// ─────────────────────────────────────────────────────────

/// `POST /campaigns/:id/withdrawals`
pub async fn create_withdrawal(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<NewWithdrawal>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    let withdrawal = withdrawals::request(&state.pool, &caller, id, input, unix_now()).await?;
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

/// `GET /campaigns/:id/withdrawals` — owner or admin only.
pub async fn list_campaign_withdrawals(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    let withdrawals = withdrawals::list_for_campaign(&state.pool, &caller, id).await?;
    Ok(Json(WithdrawalListResponse {
        count: withdrawals.len(),
        withdrawals,
    }))
}

/// `POST /withdrawals/:id/approve` — re-validates the funds invariant.
pub async fn approve_withdrawal(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    Ok(Json(withdrawals::approve(&state.pool, &caller, id, unix_now()).await?))
}

/// `POST /withdrawals/:id/reject`
pub async fn reject_withdrawal(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ReasonBody>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    Ok(Json(withdrawals::reject(&state.pool, &caller, id, body.reason, unix_now()).await?))
}

/// `POST /withdrawals/:id/proof` — attach proof-of-transfer.
pub async fn attach_withdrawal_proof(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ProofBody>,
) -> Result<impl IntoResponse> {
    let caller = caller(&headers)?;
    Ok(Json(withdrawals::attach_proof(&state.pool, &caller, id, body.proof_url).await?))
}
