//! Lifecycle transitions for status enums.

use super::ValidationError;

/// A status enum with an explicit transition table.
///
/// Implementors list the legal moves; `transition_to` and `is_terminal`
/// follow from that table.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Every state reachable in one move.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Returns `target` if the move is legal.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if !self.can_transition_to(&target) {
            return Err(ValidationError::invalid_format(
                "status",
                format!("cannot move from {:?} to {:?}", self, target),
            ));
        }
        Ok(target)
    }

    /// No outgoing moves.
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
