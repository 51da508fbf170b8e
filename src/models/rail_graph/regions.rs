use super::{RailGraph, Rails, Signals};
use crate::error::SignallingError;
use crate::logging::log;
use crate::models::{Direction, Position, RegionKey, SignalKey, TrackShape};
use indexmap::{IndexMap, IndexSet};
use tracing::warn;

/// Edits queued for regions that are not loaded yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingUpdates {
    rails: IndexMap<Position, TrackShape>,
    signals: IndexSet<SignalKey>,
}

impl PendingUpdates {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rails.len() + self.signals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rails.is_empty() && self.signals.is_empty()
    }

    #[must_use]
    pub fn has_rail(&self, position: Position) -> bool {
        self.rails.contains_key(&position)
    }

    #[must_use]
    pub fn has_signal(&self, key: SignalKey) -> bool {
        self.signals.contains(&key)
    }

    pub fn rails(&self) -> impl Iterator<Item = (Position, TrackShape)> + '_ {
        self.rails.iter().map(|(position, shape)| (*position, *shape))
    }

    pub fn signals(&self) -> impl Iterator<Item = SignalKey> + '_ {
        self.signals.iter().copied()
    }

    pub(crate) fn defer_rail(&mut self, position: Position, shape: TrackShape) {
        self.rails.insert(position, shape);
    }

    pub(crate) fn defer_signal(&mut self, key: SignalKey) {
        self.signals.insert(key);
    }

    /// Drop a queued rail along with any signals waiting to be mounted on it
    pub(crate) fn cancel_rail(&mut self, position: Position) -> bool {
        if self.rails.shift_remove(&position).is_none() {
            return false;
        }
        self.signals.retain(|key| key.rail != position);
        true
    }

    pub(crate) fn cancel_signal(&mut self, key: SignalKey) -> bool {
        self.signals.shift_remove(&key)
    }

    /// Replace the shape of a queued rail; `false` if it is not queued
    pub(crate) fn reshape_rail(&mut self, position: Position, shape: TrackShape) -> bool {
        match self.rails.get_mut(&position) {
            Some(queued) => {
                *queued = shape;
                true
            }
            None => false,
        }
    }

    /// Take every queued edit whose position passes `ready`, in queue order
    ///
    /// Signals stay queued while their rail does.
    fn take_ready(&mut self, ready: impl Fn(Position) -> bool) -> (Vec<(Position, TrackShape)>, Vec<SignalKey>) {
        let mut rails = Vec::new();
        self.rails.retain(|position, shape| {
            if ready(*position) {
                rails.push((*position, *shape));
                false
            } else {
                true
            }
        });
        let mut signals = Vec::new();
        let waiting = &self.rails;
        self.signals.retain(|key| {
            if ready(key.rail) && !waiting.contains_key(&key.rail) {
                signals.push(*key);
                false
            } else {
                true
            }
        });
        (rails, signals)
    }
}

/// Extension trait for deferring edits to regions that are not loaded
///
/// Only active when `GraphConfig::defer_unloaded_regions` is set; otherwise
/// every region counts as loaded.
pub trait Regions {
    /// Mark a region loaded and apply everything queued for it
    ///
    /// Returns the number of queued edits that were applied.
    ///
    /// # Errors
    ///
    /// Propagates structural errors from the applied edits.
    fn region_loaded(&mut self, region: RegionKey) -> Result<usize, SignallingError>;

    /// Mark a region unloaded, parking its rails and signals in the queue
    ///
    /// Returns the number of rails taken out of the graph.
    ///
    /// # Errors
    ///
    /// Propagates errors from segment recalculation.
    fn region_unloaded(&mut self, region: RegionKey) -> Result<usize, SignallingError>;

    fn is_region_loaded(&self, region: RegionKey) -> bool;

    fn pending_updates(&self) -> &PendingUpdates;
}

impl Regions for RailGraph {
    fn region_loaded(&mut self, region: RegionKey) -> Result<usize, SignallingError> {
        self.loaded_regions.insert(region);
        let size = self.config.region_size;
        let defer = self.config.defer_unloaded_regions;
        let loaded = &self.loaded_regions;
        let (rails, signals) = self
            .pending
            .take_ready(|position| !defer || loaded.contains(&position.region(size)));

        let mut applied = 0;
        for (position, shape) in rails {
            match self.add_rail(position, shape) {
                Ok(_) => applied += 1,
                Err(SignallingError::RailExists(_)) => {
                    warn!("Queued rail at {position} was already loaded");
                }
                Err(err) => return Err(err),
            }
        }
        for key in signals {
            match self.add_rail_signal(key) {
                Ok(_) => applied += 1,
                Err(err @ (SignallingError::MissingRail(_) | SignallingError::DuplicateSignal(_))) => {
                    warn!("Dropping queued signal {key}: {err}");
                }
                Err(err) => return Err(err),
            }
        }
        log!("Region {} loaded; applied {} queued edits", region, applied);
        Ok(applied)
    }

    fn region_unloaded(&mut self, region: RegionKey) -> Result<usize, SignallingError> {
        self.loaded_regions.remove(&region);
        let size = self.config.region_size;
        let mut positions: Vec<Position> = self
            .rails
            .keys()
            .filter(|position| position.region(size) == region)
            .copied()
            .collect();
        positions.sort();

        for position in &positions {
            let Some(shape) = self.rails.get(position).map(|rail| rail.shape()) else {
                continue;
            };
            let mounted: Vec<SignalKey> = Direction::ALL
                .into_iter()
                .map(|direction| SignalKey::new(*position, direction))
                .filter(|key| self.signals.contains(*key))
                .collect();
            self.remove_rail(*position)?;
            if self.config.defer_unloaded_regions {
                self.pending.defer_rail(*position, shape);
                for key in mounted {
                    self.pending.defer_signal(key);
                }
            }
        }
        log!("Region {} unloaded; {} rails parked", region, positions.len());
        Ok(positions.len())
    }

    fn is_region_loaded(&self, region: RegionKey) -> bool {
        !self.config.defer_unloaded_regions || self.loaded_regions.contains(&region)
    }

    fn pending_updates(&self) -> &PendingUpdates {
        &self.pending
    }
}
