//! Reversibility policy for executed interventions.
//!
//! Whether an action can be rolled back, and what the compensating action
//! is, are fixed properties of the action kind. Unknown actions are simply
//! not reversible.

/// The closed set of actions that have a defined compensating action.
pub const REVERSIBLE_ACTIONS: [&str; 3] = [
    "switch_gateway",
    "adjust_retry_config",
    "suppress_payment_method",
];

pub fn is_reversible(action: &str) -> bool {
    REVERSIBLE_ACTIONS.contains(&action)
}

pub fn rollback_description(action: &str) -> Option<&'static str> {
    match action {
        "switch_gateway" => Some("Restore original routing weights"),
        "adjust_retry_config" => Some("Restore default retry configuration"),
        "suppress_payment_method" => Some("Re-enable suppressed payment method"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_reversible_action_has_a_description() {
        for action in REVERSIBLE_ACTIONS {
            assert!(is_reversible(action));
            assert!(rollback_description(action).is_some());
        }
    }

    #[test]
    fn unknown_actions_are_rejected() {
        assert!(!is_reversible("increase_monitoring"));
        assert!(!is_reversible("send_alert"));
        assert!(!is_reversible(""));
        assert!(rollback_description("send_alert").is_none());
    }

    #[test]
    fn switch_gateway_maps_to_routing_restore() {
        assert_eq!(
            rollback_description("switch_gateway"),
            Some("Restore original routing weights")
        );
    }
}
