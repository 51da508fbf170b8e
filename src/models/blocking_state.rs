use serde::{Deserialize, Serialize};

/// Occupancy state of a segment
///
/// A segment cycles `Open -> Expecting -> Closed -> Open`; no other
/// transition is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlockingState {
    /// Ready for a train to reserve it
    #[default]
    Open,
    /// Reserved for an announced train that has not entered yet
    Expecting,
    /// A train is inside
    Closed,
}

impl BlockingState {
    /// The next state in the reservation cycle
    #[must_use]
    pub fn successor(self) -> Self {
        match self {
            BlockingState::Open => BlockingState::Expecting,
            BlockingState::Expecting => BlockingState::Closed,
            BlockingState::Closed => BlockingState::Open,
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.successor() == next
    }

    /// How restrictive the state is; used when two segments merge
    #[must_use]
    pub fn severity(self) -> u8 {
        match self {
            BlockingState::Open => 0,
            BlockingState::Expecting => 1,
            BlockingState::Closed => 2,
        }
    }
}

/// What a signal head displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignalAspect {
    Green,
    Yellow,
    Red,
    /// Not guarding any segment
    #[default]
    None,
}

impl From<BlockingState> for SignalAspect {
    fn from(state: BlockingState) -> Self {
        match state {
            BlockingState::Open => SignalAspect::Green,
            BlockingState::Expecting => SignalAspect::Yellow,
            BlockingState::Closed => SignalAspect::Red,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_is_closed() {
        let mut state = BlockingState::Open;
        for _ in 0..3 {
            state = state.successor();
        }
        assert_eq!(state, BlockingState::Open);
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(BlockingState::Open.can_transition_to(BlockingState::Expecting));
        assert!(BlockingState::Closed.can_transition_to(BlockingState::Open));
        assert!(!BlockingState::Closed.can_transition_to(BlockingState::Expecting));
        assert!(!BlockingState::Open.can_transition_to(BlockingState::Closed));
        assert!(!BlockingState::Expecting.can_transition_to(BlockingState::Open));
        assert!(!BlockingState::Open.can_transition_to(BlockingState::Open));
    }

    #[test]
    fn test_aspect_mapping() {
        assert_eq!(SignalAspect::from(BlockingState::Open), SignalAspect::Green);
        assert_eq!(SignalAspect::from(BlockingState::Expecting), SignalAspect::Yellow);
        assert_eq!(SignalAspect::from(BlockingState::Closed), SignalAspect::Red);
        assert_eq!(SignalAspect::default(), SignalAspect::None);
    }
}
