use super::blocking_state::{BlockingState, SignalAspect};
use super::position::{Direction, Position};
use super::segment::SegmentId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a signal: the rail it is mounted on and the direction it controls
///
/// The signal guards the link between the mounted rail (where trains wait)
/// and the rail one step further in the controlled direction, which lies in
/// the protected segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalKey {
    pub rail: Position,
    pub direction: Direction,
}

impl SignalKey {
    #[must_use]
    pub const fn new(rail: Position, direction: Direction) -> Self {
        Self { rail, direction }
    }

    /// Rail on the protected side of the signal
    #[must_use]
    pub fn exit_rail(self) -> Position {
        self.rail.offset(self.direction)
    }

    /// The signal on the same link facing the other way
    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            rail: self.exit_rail(),
            direction: self.direction.opposite(),
        }
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.rail, self.direction)
    }
}

/// Notification queued for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalEvent {
    /// The guarded segment changed state (or the signal just started guarding it,
    /// in which case `previous == current`)
    StateChanged {
        signal: SignalKey,
        previous: BlockingState,
        current: BlockingState,
    },
    /// The signal no longer guards any segment
    Unguarded { signal: SignalKey },
}

impl SignalEvent {
    #[must_use]
    pub fn signal(&self) -> SignalKey {
        match self {
            SignalEvent::StateChanged { signal, .. } | SignalEvent::Unguarded { signal } => *signal,
        }
    }

    #[must_use]
    pub fn aspect(&self) -> SignalAspect {
        match self {
            SignalEvent::StateChanged { current, .. } => (*current).into(),
            SignalEvent::Unguarded { .. } => SignalAspect::None,
        }
    }
}

/// A directional guard mounted on a rail
///
/// Signals never change the structure of the graph. They only observe the
/// segment they guard and map its state to an aspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RailSignal {
    key: SignalKey,
    guarded: Option<SegmentId>,
    aspect: SignalAspect,
}

impl RailSignal {
    #[must_use]
    pub fn new(key: SignalKey) -> Self {
        Self {
            key,
            guarded: None,
            aspect: SignalAspect::None,
        }
    }

    #[must_use]
    pub fn key(&self) -> SignalKey {
        self.key
    }

    #[must_use]
    pub fn controlled_direction(&self) -> Direction {
        self.key.direction
    }

    #[must_use]
    pub fn attached_rail(&self) -> Position {
        self.key.rail
    }

    /// Rail trains stand on while waiting at this signal
    #[must_use]
    pub fn rail_for_entering_segment(&self) -> Position {
        self.key.rail
    }

    /// First rail of the segment this signal protects
    #[must_use]
    pub fn rail_for_protected_segment(&self) -> Position {
        self.key.exit_rail()
    }

    #[must_use]
    pub fn guarded_segment(&self) -> Option<SegmentId> {
        self.guarded
    }

    #[must_use]
    pub fn aspect(&self) -> SignalAspect {
        self.aspect
    }

    /// Called by the guarded segment on every transition
    pub fn on_state_change(&mut self, previous: BlockingState, current: BlockingState) -> SignalEvent {
        self.aspect = current.into();
        SignalEvent::StateChanged {
            signal: self.key,
            previous,
            current,
        }
    }

    pub(crate) fn set_guarded(&mut self, segment: Option<SegmentId>) {
        self.guarded = segment;
    }

    pub(crate) fn on_unguarded(&mut self) -> SignalEvent {
        self.guarded = None;
        self.aspect = SignalAspect::None;
        SignalEvent::Unguarded { signal: self.key }
    }
}

/// All registered signals plus the outgoing event queue
#[derive(Debug, Clone, Default)]
pub struct SignalTable {
    signals: IndexMap<SignalKey, RailSignal>,
    events: Vec<SignalEvent>,
}

impl SignalTable {
    #[must_use]
    pub fn get(&self, key: SignalKey) -> Option<&RailSignal> {
        self.signals.get(&key)
    }

    #[must_use]
    pub fn contains(&self, key: SignalKey) -> bool {
        self.signals.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RailSignal> {
        self.signals.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Events queued since the last drain
    #[must_use]
    pub fn pending_events(&self) -> &[SignalEvent] {
        &self.events
    }

    pub(crate) fn insert(&mut self, signal: RailSignal) {
        self.signals.insert(signal.key(), signal);
    }

    pub(crate) fn remove(&mut self, key: SignalKey) -> Option<RailSignal> {
        self.signals.shift_remove(&key)
    }

    pub(crate) fn get_mut(&mut self, key: SignalKey) -> Option<&mut RailSignal> {
        self.signals.get_mut(&key)
    }

    /// Deliver one state change to one signal
    pub(crate) fn notify(&mut self, key: SignalKey, previous: BlockingState, current: BlockingState) {
        if let Some(signal) = self.signals.get_mut(&key) {
            let event = signal.on_state_change(previous, current);
            self.events.push(event);
        }
    }

    pub(crate) fn push_event(&mut self, event: SignalEvent) {
        self.events.push(event);
    }

    pub(crate) fn drain_events(&mut self) -> Vec<SignalEvent> {
        std::mem::take(&mut self.events)
    }
}
