use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of a train holding segment reservations
///
/// The train controller owns everything else about a train; segments only
/// compare identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainId(pub u64);

impl fmt::Display for TrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "train {}", self.0)
    }
}
