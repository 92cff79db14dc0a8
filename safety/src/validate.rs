//! §4.5a: validates an `ExecutionIntent` before it reaches the executor.

use bigamount::BigAmount;
use chrono::{DateTime, Utc};
use types::{AgentConfig, ExecutionIntent, ExecutionResult, ResultStatus};

use crate::base58::looks_like_base58_mint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    KillSwitchOn,
    SameMint,
    InvalidMintFormat,
    InvalidAmount,
    AmountTooLarge,
    InvalidSlippage,
    NotInAllowList,
}

impl RejectReason {
    /// Human-readable reason text, matching the literal wording §8
    /// scenario D expects for the kill-switch case.
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::KillSwitchOn => "Global kill switch is enabled",
            RejectReason::SameMint => "input_mint and output_mint are identical",
            RejectReason::InvalidMintFormat => "mint failed base58 format check",
            RejectReason::InvalidAmount => "amount_lamports is not a positive integer",
            RejectReason::AmountTooLarge => "amount_lamports exceeds the configured maximum",
            RejectReason::InvalidSlippage => "slippage_bps is outside the configured range",
            RejectReason::NotInAllowList => "mint is not in the configured allow-list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Rejected(RejectReason),
    Expired,
}

/// Validates `intent` against `config` (§4.5a). Checked in the order the
/// spec lists rejection reasons in; the first violation wins.
pub fn validate(intent: &ExecutionIntent, config: &AgentConfig, now: DateTime<Utc>) -> ValidationOutcome {
    if config.kill_switch {
        return ValidationOutcome::Rejected(RejectReason::KillSwitchOn);
    }

    if intent.input_mint == intent.output_mint {
        return ValidationOutcome::Rejected(RejectReason::SameMint);
    }

    let mint_to_check = non_native_mint(intent);
    if !looks_like_base58_mint(mint_to_check) {
        return ValidationOutcome::Rejected(RejectReason::InvalidMintFormat);
    }

    let amount = match BigAmount::from_decimal_string(&intent.amount_lamports) {
        Ok(a) if !a.is_zero() => a,
        _ => return ValidationOutcome::Rejected(RejectReason::InvalidAmount),
    };
    if amount > config.max_amount_lamports {
        return ValidationOutcome::Rejected(RejectReason::AmountTooLarge);
    }

    if intent.slippage_bps < 1 || intent.slippage_bps > config.max_slippage_bps {
        return ValidationOutcome::Rejected(RejectReason::InvalidSlippage);
    }

    if let Some(allow_list) = &config.allow_list {
        if !allow_list.contains(&mint_to_check.to_string()) {
            return ValidationOutcome::Rejected(RejectReason::NotInAllowList);
        }
    }

    if let Some(expires_at) = intent.expires_at {
        if expires_at < now {
            return ValidationOutcome::Expired;
        }
    }

    ValidationOutcome::Valid
}

/// The intent always has one native leg and one token leg; the allow-list
/// and base58 checks apply to the token leg, never the native mint.
fn non_native_mint(intent: &ExecutionIntent) -> &str {
    const NATIVE: &str = "So11111111111111111111111111111111111111112";
    if intent.input_mint == NATIVE {
        &intent.output_mint
    } else {
        &intent.input_mint
    }
}

/// Builds the `ExecutionResult` a rejected/expired `ValidationOutcome`
/// produces, so the engine never constructs these by hand (§8, "Result
/// completeness": every rejected/expired intent yields a result).
pub fn to_execution_result(
    intent: &ExecutionIntent,
    outcome: ValidationOutcome,
    now: DateTime<Utc>,
) -> Option<ExecutionResult> {
    match outcome {
        ValidationOutcome::Valid => None,
        ValidationOutcome::Rejected(reason) => Some(
            ExecutionResult::new(intent.id.clone(), now, ResultStatus::Rejected)
                .with_reason(reason.message()),
        ),
        ValidationOutcome::Expired => Some(
            ExecutionResult::new(intent.id.clone(), now, ResultStatus::Expired)
                .with_reason("intent expired before execution"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{Action, IntentKind};

    fn base_intent() -> ExecutionIntent {
        ExecutionIntent {
            kind: IntentKind::ExecutionIntent,
            id: "intent-1".to_string(),
            created_at: Utc::now(),
            expires_at: None,
            action: Action::Buy,
            input_mint: "So11111111111111111111111111111111111111112".to_string(),
            output_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            amount_lamports: "500000000".to_string(),
            slippage_bps: 100,
            metadata: None,
        }
    }

    fn config() -> AgentConfig {
        AgentConfig::from_env().unwrap()
    }

    #[test]
    fn valid_intent_passes() {
        let outcome = validate(&base_intent(), &config(), Utc::now());
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[test]
    fn scenario_d_kill_switch_rejects_with_exact_message() {
        let mut cfg = config();
        cfg.kill_switch = true;
        let outcome = validate(&base_intent(), &cfg, Utc::now());
        assert_eq!(outcome, ValidationOutcome::Rejected(RejectReason::KillSwitchOn));

        let result = to_execution_result(&base_intent(), outcome, Utc::now()).unwrap();
        assert_eq!(result.status, ResultStatus::Rejected);
        assert_eq!(result.reason.as_deref(), Some("Global kill switch is enabled"));
    }

    #[test]
    fn same_mint_is_rejected() {
        let mut intent = base_intent();
        intent.output_mint = intent.input_mint.clone();
        let outcome = validate(&intent, &config(), Utc::now());
        assert_eq!(outcome, ValidationOutcome::Rejected(RejectReason::SameMint));
    }

    #[test]
    fn malformed_mint_is_rejected() {
        let mut intent = base_intent();
        intent.output_mint = "short".to_string();
        let outcome = validate(&intent, &config(), Utc::now());
        assert_eq!(outcome, ValidationOutcome::Rejected(RejectReason::InvalidMintFormat));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let mut intent = base_intent();
        intent.amount_lamports = "0".to_string();
        let outcome = validate(&intent, &config(), Utc::now());
        assert_eq!(outcome, ValidationOutcome::Rejected(RejectReason::InvalidAmount));
    }

    #[test]
    fn amount_above_max_is_rejected() {
        let mut cfg = config();
        cfg.max_amount_lamports = BigAmount::from_u64(1_000);
        let mut intent = base_intent();
        intent.amount_lamports = "2_000".replace('_', "");
        let outcome = validate(&intent, &cfg, Utc::now());
        assert_eq!(outcome, ValidationOutcome::Rejected(RejectReason::AmountTooLarge));
    }

    #[test]
    fn slippage_out_of_range_is_rejected() {
        let mut intent = base_intent();
        intent.slippage_bps = 0;
        let outcome = validate(&intent, &config(), Utc::now());
        assert_eq!(outcome, ValidationOutcome::Rejected(RejectReason::InvalidSlippage));
    }

    #[test]
    fn mint_outside_allow_list_is_rejected() {
        let mut cfg = config();
        cfg.allow_list = Some(vec!["SomeOtherMint".to_string()]);
        let outcome = validate(&base_intent(), &cfg, Utc::now());
        assert_eq!(outcome, ValidationOutcome::Rejected(RejectReason::NotInAllowList));
    }

    #[test]
    fn expired_is_distinct_from_rejected() {
        let mut intent = base_intent();
        intent.expires_at = Some(Utc::now() - chrono::Duration::minutes(5));
        let outcome = validate(&intent, &config(), Utc::now());
        assert_eq!(outcome, ValidationOutcome::Expired);
    }
}
