use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};

use settlement_core::audit::AuditLog;
use settlement_core::envelope::unwrap_envelope;
use settlement_core::error::SettlementError;
use settlement_core::ledger::verify_ledger;
use settlement_core::settlement::settle_ledger;
use settlement_core::types::{EntryError, PlainLedger, SubmissionInput};
use settlement_core::canonical::CanonicalVariant;

use crate::state::AppState;

/// Canonical encoding rule this deployment signs under (see DESIGN.md).
const CANONICAL_VARIANT: CanonicalVariant = CanonicalVariant::Extended;

#[derive(Serialize)]
struct SettleResponse {
    settled: bool,
    settled_transactions: Vec<String>,
    already_settled: Vec<String>,
    errors: Vec<EntryError>,
    audit_log_ids: Vec<i64>,
}

#[derive(Serialize)]
struct VerifyResponse {
    valid: bool,
    verified_transactions: Vec<String>,
    errors: Vec<EntryError>,
}

#[derive(Deserialize)]
struct AuditLogQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Resolve a submission into the plaintext ledger it carries, unwrapping an
/// envelope through the bank's ECDH identity when present. Every decrypt
/// failure is audited before it's returned, since a caller that can't read
/// the response body still needs a durable record of the attempt.
fn resolve_ledger(
    state: &AppState,
    input: SubmissionInput,
) -> Result<PlainLedger, SettlementError> {
    match input {
        SubmissionInput::Plain(ledger) => Ok(ledger),
        SubmissionInput::Envelope(envelope) => {
            let audit = AuditLog::new(&state.store);
            match unwrap_envelope(&envelope, state.bank.as_ref()) {
                Ok(ledger) => {
                    let _ = audit.record("bank", "decrypt_envelope", None, "success", None);
                    Ok(ledger)
                }
                Err(e) => {
                    let _ = audit.record(
                        "bank",
                        "decrypt_envelope",
                        None,
                        "error",
                        Some(&e.to_string()),
                    );
                    Err(e)
                }
            }
        }
    }
}

fn malformed_submission_response() -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "error": "request body is neither a valid plaintext ledger nor a valid envelope"
    }))
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok", "service": "settlement-server" }))
}

#[post("/settle")]
pub async fn settle(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let input: SubmissionInput = match serde_json::from_slice(&body) {
        Ok(input) => input,
        Err(_) => return malformed_submission_response(),
    };

    let ledger = match resolve_ledger(&state, input) {
        Ok(ledger) => ledger,
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "settled": false,
                "settled_transactions": Vec::<String>::new(),
                "already_settled": Vec::<String>::new(),
                "errors": [{ "ledger_index": 0, "reason": e.to_string() }],
                "audit_log_ids": Vec::<i64>::new(),
            }));
        }
    };

    let verification = verify_ledger(&ledger, CANONICAL_VARIANT);
    let outcome = settle_ledger(&state.store, &ledger, &verification);

    let response = SettleResponse {
        settled: outcome.settled(),
        settled_transactions: outcome.settled_transactions,
        already_settled: outcome.already_settled,
        errors: outcome.errors,
        audit_log_ids: outcome.audit_log_ids,
    };
    HttpResponse::Ok().json(response)
}

#[post("/verify")]
pub async fn verify(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let input: SubmissionInput = match serde_json::from_slice(&body) {
        Ok(input) => input,
        Err(_) => return malformed_submission_response(),
    };

    let ledger = match resolve_ledger(&state, input) {
        Ok(ledger) => ledger,
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "valid": false,
                "verified_transactions": Vec::<String>::new(),
                "errors": [{ "ledger_index": 0, "reason": e.to_string() }],
            }));
        }
    };

    let verification = verify_ledger(&ledger, CANONICAL_VARIANT);
    let response = VerifyResponse {
        valid: verification.valid,
        verified_transactions: verification.verified_transaction_ids(),
        errors: verification.errors,
    };
    HttpResponse::Ok().json(response)
}

#[get("/bank-key")]
pub async fn bank_key(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "public_key": state.bank.public_jwk() }))
}

#[get("/audit-log")]
pub async fn audit_log(state: web::Data<AppState>, query: web::Query<AuditLogQuery>) -> HttpResponse {
    let audit = AuditLog::new(&state.store);
    match audit.list(query.limit, query.offset) {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => {
            tracing::error!(error = %e, "failed to list audit log");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "failed to list audit log"
            }))
        }
    }
}
