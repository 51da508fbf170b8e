use super::{LinkOutcome, RailGraph};
use crate::error::SignallingError;
use crate::logging::log;
use crate::models::{RailSignal, SegmentId, SignalKey};
use tracing::warn;

/// Extension trait for placing and removing signals
pub trait Signals {
    /// Register a signal and split the segment it cuts through
    ///
    /// Returns the segment the signal now protects, `Unlinked` when there is
    /// nothing on its protected side, or `Deferred` when its region is not
    /// loaded yet.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateSignal` for a key already registered (or queued) and
    /// `MissingRail` when no rail is loaded under the signal.
    fn add_rail_signal(&mut self, key: SignalKey) -> Result<LinkOutcome, SignallingError>;

    /// Unregister a signal and merge the segments it separated
    ///
    /// Returns `false` (after logging) when the signal is unknown.
    ///
    /// # Errors
    ///
    /// Propagates errors from segment recalculation.
    fn remove_rail_signal(&mut self, key: SignalKey) -> Result<bool, SignallingError>;

    /// Split the segment around a newly closed link, unless a loop keeps it whole
    ///
    /// Returns the segment on the signal's protected side. When the link is
    /// missing (the signal points at empty track) nothing is split and the
    /// mounted rail's segment is returned.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSignal` if the signal is not registered.
    fn break_segment(&mut self, key: SignalKey) -> Result<SegmentId, SignallingError>;
}

impl Signals for RailGraph {
    fn add_rail_signal(&mut self, key: SignalKey) -> Result<LinkOutcome, SignallingError> {
        if self.signals.contains(key) || self.pending.has_signal(key) {
            return Err(SignallingError::DuplicateSignal(key));
        }
        if !self.region_available(key.rail) || self.pending.has_rail(key.rail) {
            self.pending.defer_signal(key);
            log!("Deferred signal {} until its rail loads", key);
            return Ok(LinkOutcome::Deferred);
        }
        if !self.rails.contains_key(&key.rail) {
            return Err(SignallingError::MissingRail(key.rail));
        }
        if self.live_segment_of(key.rail).is_none() {
            warn!("Rail {} under signal {key} has no segment; recalculating", key.rail);
            self.recalculate_segments_near_vertex(key.rail)?;
        }

        self.signals.insert(RailSignal::new(key));
        self.dirty.insert(key.rail);
        self.dirty.insert(key.exit_rail());
        if let Some(edge) = self.link_between(key.rail, key.exit_rail()) {
            let link = &mut self.graph[edge];
            link.signals = link.signals.saturating_add(1);
            if link.signals == 1 {
                self.break_segment(key)?;
            }
        }
        self.finish_update()?;

        Ok(self
            .signals
            .get(key)
            .and_then(RailSignal::guarded_segment)
            .map_or(LinkOutcome::Unlinked, LinkOutcome::Linked))
    }

    fn remove_rail_signal(&mut self, key: SignalKey) -> Result<bool, SignallingError> {
        if self.pending.cancel_signal(key) {
            return Ok(true);
        }
        if !self.signals.contains(key) {
            warn!("Attempting to remove signal {key} that does not exist");
            return Ok(false);
        }

        if self.discard_signal(key) {
            let mount = key.rail;
            let exit = key.exit_rail();
            match (self.live_segment_of(mount), self.live_segment_of(exit)) {
                // Entering side survives, the protected side is folded into it
                (Some(entering), Some(protected)) if entering != protected => {
                    self.propagate_segment(entering, exit)?;
                }
                _ => self.recalculate_segments_near_vertex(mount)?,
            }
        }
        self.finish_update()?;
        log!("Removed signal {}", key);
        Ok(true)
    }

    fn break_segment(&mut self, key: SignalKey) -> Result<SegmentId, SignallingError> {
        if !self.signals.contains(key) {
            return Err(SignallingError::UnknownSignal(key));
        }
        let mount = key.rail;
        let exit = key.exit_rail();
        let segment = self.ensure_segment(mount)?;

        if self.link_between(mount, exit).is_none() {
            return Ok(segment);
        }
        match self.live_segment_of(exit) {
            Some(other) if other != segment => return Ok(other),
            Some(_) => {}
            None => return self.map_segment_inheriting(exit, None),
        }
        if self.connected_over_open_links(mount, exit) {
            log!("Signal {} closes a loop; segment {} stays whole", key, segment);
            return Ok(segment);
        }

        let inherit = self.segment_state(segment);
        let protected = self.map_segment_inheriting(exit, inherit)?;
        log!("Signal {} split segment {} off {}", key, protected, segment);
        Ok(protected)
    }
}
