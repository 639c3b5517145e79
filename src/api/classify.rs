//! Classification of server error text into credit/quota exhaustion.
//!
//! Pure and deterministic: no I/O, no state. Credits errors always map to
//! one of three fixed, user-presentable messages so the UI layer never
//! shows raw server output for an expected business outcome.

/// Substrings that mark an error as a usage/credit problem.
const CREDIT_VOCABULARY: &[&str] = &["credit", "limit", "quota", "subscription", "usage"];

/// Shown when the weekly allowance is used up.
pub const WEEKLY_LIMIT_MESSAGE: &str =
    "You have reached your weekly AI analysis limit. Credits refresh every Monday.";

/// Shown when the plan itself does not cover the request.
pub const UPGRADE_PLAN_MESSAGE: &str =
    "AI analyses are not included in your current plan. Upgrade your subscription to keep going.";

/// Fallback for credits errors matching no specific phrase.
pub const GENERIC_CREDITS_MESSAGE: &str =
    "AI credit limit reached. Please try again once your credits refresh.";

/// Outcome of classifying raw server error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_credits_error: bool,
    /// A fixed friendly message for credits errors; the original text,
    /// unchanged, otherwise. Absent input yields absent output.
    pub message: Option<String>,
}

/// Decide whether raw error text reports usage/credit exhaustion and pick
/// the user-facing message.
pub fn classify(raw: Option<&str>) -> Classification {
    let Some(raw) = raw else {
        return Classification {
            is_credits_error: false,
            message: None,
        };
    };

    let lower = raw.to_lowercase();
    if !CREDIT_VOCABULARY.iter().any(|word| lower.contains(word)) {
        return Classification {
            is_credits_error: false,
            message: Some(raw.to_string()),
        };
    }

    let message = if lower.contains("credit limit reached") || lower.contains("out of credits") {
        WEEKLY_LIMIT_MESSAGE
    } else if lower.contains("subscription") || lower.contains("plan") {
        UPGRADE_PLAN_MESSAGE
    } else {
        GENERIC_CREDITS_MESSAGE
    };

    Classification {
        is_credits_error: true,
        message: Some(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_limit_text_gets_weekly_message() {
        let verdict = classify(Some(
            "You have reached your credit limit reached for this week",
        ));
        assert!(verdict.is_credits_error);
        let message = verdict.message.unwrap();
        assert!(message.contains("weekly"));
        assert!(message.contains("Monday"));
    }

    #[test]
    fn out_of_credits_gets_weekly_message() {
        let verdict = classify(Some("Out of credits"));
        assert!(verdict.is_credits_error);
        assert_eq!(verdict.message.as_deref(), Some(WEEKLY_LIMIT_MESSAGE));
    }

    #[test]
    fn subscription_text_gets_upgrade_message() {
        let verdict = classify(Some("Your subscription does not allow this"));
        assert!(verdict.is_credits_error);
        assert_eq!(verdict.message.as_deref(), Some(UPGRADE_PLAN_MESSAGE));
    }

    #[test]
    fn vague_quota_text_gets_generic_message() {
        let verdict = classify(Some("usage exceeded"));
        assert!(verdict.is_credits_error);
        assert_eq!(verdict.message.as_deref(), Some(GENERIC_CREDITS_MESSAGE));
    }

    #[test]
    fn unrelated_text_passes_through_unchanged() {
        let verdict = classify(Some("Invalid trade ID"));
        assert!(!verdict.is_credits_error);
        assert_eq!(verdict.message.as_deref(), Some("Invalid trade ID"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let verdict = classify(Some("QUOTA EXHAUSTED"));
        assert!(verdict.is_credits_error);
    }

    #[test]
    fn absent_input_yields_absent_output() {
        let verdict = classify(None);
        assert!(!verdict.is_credits_error);
        assert!(verdict.message.is_none());
    }

    #[test]
    fn specific_phrase_wins_over_subscription_wording() {
        // "Subscription credit limit reached" names both; the concrete
        // limit-reached phrase decides the message.
        let verdict = classify(Some("Subscription credit limit reached"));
        assert!(verdict.is_credits_error);
        assert_eq!(verdict.message.as_deref(), Some(WEEKLY_LIMIT_MESSAGE));
    }
}
