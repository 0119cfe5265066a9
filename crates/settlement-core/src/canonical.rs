//! Canonical encoding of a transaction's core fields.
//!
//! Produces the exact byte sequence the customer's browser signed, so the
//! server can recompute the same SHA-256 digest and verify the same ECDSA
//! signature. Two variants exist in the wild: a `compact` form without
//! `wallet_id` and an `extended` form with it. This deployment is wired to
//! the extended variant, with `wallet_id` substituted by the empty string
//! when absent — both encoders remain available so a different deployment
//! can reconfigure.

use crate::error::SettlementError;
use rust_decimal::Decimal;

/// Which canonicalization rule a deployment signs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalVariant {
    /// `txn_id, from_id, to_id, amount, timestamp, prev_hash`
    Compact,
    /// Compact plus a trailing `wallet_id` (empty string when absent).
    Extended,
}

/// The fields canonical encoding is computed over. Deliberately narrower than
/// the full `Transaction` record (it excludes `hash`, `signature`, and
/// `sender_public_key`, which are derived from or verified against this
/// encoding, not part of it).
#[derive(Debug, Clone)]
pub struct CanonicalFields<'a> {
    pub txn_id: &'a str,
    pub from_id: &'a str,
    pub to_id: &'a str,
    pub amount: Decimal,
    pub timestamp: &'a str,
    pub prev_hash: &'a str,
    pub wallet_id: Option<&'a str>,
}

/// Render a decimal amount the way a JavaScript number would stringify: the
/// shortest round-trip decimal, with no trailing `.0` for integral values.
///
/// `Decimal::normalize` strips trailing zeros from the scale (`10.50` ->
/// `10.5`, `10.00` -> `10`), which is exactly the shape `Number#toString`
/// produces for the two-fractional-digit amounts this system deals in.
pub fn format_amount(amount: Decimal) -> String {
    amount.normalize().to_string()
}

fn json_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn require_nonempty(name: &str, value: &str) -> Result<(), SettlementError> {
    if value.is_empty() {
        return Err(SettlementError::CanonicalFormError(format!(
            "missing required field: {name}"
        )));
    }
    Ok(())
}

/// Encode the compact variant (no `wallet_id`).
pub fn encode_compact(fields: &CanonicalFields<'_>) -> Result<Vec<u8>, SettlementError> {
    require_nonempty("txn_id", fields.txn_id)?;
    require_nonempty("from_id", fields.from_id)?;
    require_nonempty("to_id", fields.to_id)?;
    require_nonempty("timestamp", fields.timestamp)?;

    let s = format!(
        "{{\"txn_id\":{},\"from_id\":{},\"to_id\":{},\"amount\":{},\"timestamp\":{},\"prev_hash\":{}}}",
        json_string(fields.txn_id),
        json_string(fields.from_id),
        json_string(fields.to_id),
        format_amount(fields.amount),
        json_string(fields.timestamp),
        json_string(fields.prev_hash),
    );
    Ok(s.into_bytes())
}

/// Encode the extended variant (`wallet_id` appended, empty string if absent).
pub fn encode_extended(fields: &CanonicalFields<'_>) -> Result<Vec<u8>, SettlementError> {
    require_nonempty("txn_id", fields.txn_id)?;
    require_nonempty("from_id", fields.from_id)?;
    require_nonempty("to_id", fields.to_id)?;
    require_nonempty("timestamp", fields.timestamp)?;

    let wallet_id = fields.wallet_id.unwrap_or("");
    let s = format!(
        "{{\"txn_id\":{},\"from_id\":{},\"to_id\":{},\"amount\":{},\"timestamp\":{},\"prev_hash\":{},\"wallet_id\":{}}}",
        json_string(fields.txn_id),
        json_string(fields.from_id),
        json_string(fields.to_id),
        format_amount(fields.amount),
        json_string(fields.timestamp),
        json_string(fields.prev_hash),
        json_string(wallet_id),
    );
    Ok(s.into_bytes())
}

/// Encode under the given variant. This is the entry point used by the
/// ledger verifier.
pub fn encode(
    variant: CanonicalVariant,
    fields: &CanonicalFields<'_>,
) -> Result<Vec<u8>, SettlementError> {
    match variant {
        CanonicalVariant::Compact => encode_compact(fields),
        CanonicalVariant::Extended => encode_extended(fields),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> CanonicalFields<'static> {
        CanonicalFields {
            txn_id: "T1",
            from_id: "alice",
            to_id: "bob",
            amount: dec!(10.5),
            timestamp: "2026-07-27T00:00:00Z",
            prev_hash: "",
            wallet_id: None,
        }
    }

    #[test]
    fn compact_has_no_whitespace_and_key_order() {
        let bytes = encode_compact(&sample()).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert_eq!(
            s,
            r#"{"txn_id":"T1","from_id":"alice","to_id":"bob","amount":10.5,"timestamp":"2026-07-27T00:00:00Z","prev_hash":""}"#
        );
    }

    #[test]
    fn extended_appends_empty_wallet_id_when_absent() {
        let bytes = encode_extended(&sample()).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(s.ends_with(r#","wallet_id":""}"#));
    }

    #[test]
    fn extended_includes_wallet_id_when_present() {
        let mut f = sample();
        f.wallet_id = Some("W1");
        let bytes = encode_extended(&f).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(s.ends_with(r#","wallet_id":"W1"}"#));
    }

    #[test]
    fn integral_amount_has_no_decimal_point() {
        let mut f = sample();
        f.amount = dec!(10.00);
        let bytes = encode_compact(&f).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(s.contains(r#""amount":10,"#));
    }

    #[test]
    fn trailing_zero_amount_is_shortened() {
        let mut f = sample();
        f.amount = dec!(10.50);
        let bytes = encode_compact(&f).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(s.contains(r#""amount":10.5,"#));
    }

    #[test]
    fn missing_txn_id_fails() {
        let mut f = sample();
        f.txn_id = "";
        let err = encode_compact(&f).unwrap_err();
        assert!(matches!(err, SettlementError::CanonicalFormError(_)));
    }

    #[test]
    fn empty_prev_hash_is_allowed() {
        let f = sample();
        assert!(encode_compact(&f).is_ok());
    }
}
