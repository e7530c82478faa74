//! Deployment status lifecycle
//!
//! Status only moves forward: pending -> running -> {success | failed}.
//! A submission rejected before any work may fail straight from pending.
//! The one sanctioned re-entry is a destroy, which takes a record back to
//! running under its existing identifier, whether the record is terminal
//! or the deployment task is still in flight.

use crate::models::deployment::DeploymentStatus;

/// Validate a status transition, returning the reason when it is not allowed
pub fn check_transition(from: DeploymentStatus, to: DeploymentStatus) -> Result<(), String> {
    use DeploymentStatus::*;

    match (from, to) {
        (Pending, Running) => Ok(()),
        // Rejected before any external step was dispatched
        (Pending, Failed) => Ok(()),
        (Running, Success) => Ok(()),
        (Running, Failed) => Ok(()),
        // A destroy starts while the deployment task is still in flight
        (Running, Running) => Ok(()),
        // Destroy re-enters running on a terminal record
        (Success, Running) => Ok(()),
        (Failed, Running) => Ok(()),
        (from, to) => Err(format!("Invalid status transition: {} -> {}", from, to)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeploymentStatus::*;

    #[test]
    fn test_forward_transitions() {
        check_transition(Pending, Running).unwrap();
        check_transition(Running, Success).unwrap();
        check_transition(Running, Failed).unwrap();
        check_transition(Pending, Failed).unwrap();
    }

    #[test]
    fn test_success_requires_running() {
        assert!(check_transition(Pending, Success).is_err());
    }

    #[test]
    fn test_terminal_states_only_reopen_for_destroy() {
        check_transition(Success, Running).unwrap();
        check_transition(Failed, Running).unwrap();

        assert!(check_transition(Success, Failed).is_err());
        assert!(check_transition(Failed, Success).is_err());
        assert!(check_transition(Success, Pending).is_err());
    }

    #[test]
    fn test_destroy_can_land_while_running() {
        check_transition(Running, Running).unwrap();
    }

    #[test]
    fn test_pending_never_self_transitions() {
        assert!(check_transition(Pending, Pending).is_err());
    }
}
