use super::segment::{Segment, SegmentId};
use std::collections::BTreeSet;
use tracing::warn;

/// Id-indexed table of live segments with a first-fit free list
///
/// Ids are handed out lowest-first so the id space stays dense. An id goes
/// back on the free list only once its segment holds no rails.
#[derive(Debug, Clone, Default)]
pub struct SegmentPool {
    slots: Vec<Option<Segment>>,
    free: BTreeSet<u32>,
}

impl SegmentPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, empty segment under the lowest unused id
    pub(crate) fn allocate(&mut self) -> SegmentId {
        let id = match self.free.pop_first() {
            Some(id) => SegmentId(id),
            None => {
                let next = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                self.slots.push(None);
                SegmentId(next)
            }
        };
        self.slots[id.index()] = Some(Segment::new(id));
        id
    }

    /// Create a segment under a specific id, as recorded in a snapshot
    ///
    /// Returns `false` if the id is already live.
    pub(crate) fn allocate_at(&mut self, id: SegmentId) -> bool {
        if self.get(id).is_some() {
            return false;
        }
        while self.slots.len() <= id.index() {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(None);
            self.free.insert(index);
        }
        self.free.remove(&id.0);
        self.slots[id.index()] = Some(Segment::new(id));
        true
    }

    /// Return an empty segment's id to the free list
    ///
    /// Segments that still own rails are kept and `None` is returned.
    pub(crate) fn retire(&mut self, id: SegmentId) -> Option<Segment> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.as_ref().is_some_and(|segment| !segment.is_empty()) {
            warn!("Refusing to retire segment {id} while it still owns rails");
            return None;
        }
        let segment = slot.take()?;
        self.free.insert(id.0);
        Some(segment)
    }

    #[must_use]
    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    #[must_use]
    pub fn contains(&self, id: SegmentId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn ids(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.iter().map(Segment::id)
    }

    /// Number of live segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}
