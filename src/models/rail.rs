use super::position::{Connections, Direction, Position};
use super::segment::SegmentId;
use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Axis of a straight piece of track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    NorthSouth,
    EastWest,
}

/// Physical layout of a track piece, deciding which neighbours it reaches for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackShape {
    Straight(Axis),
    Curve(Direction, Direction),
    /// Switches, crossings and anything else with an arbitrary set of exits
    Junction(Connections),
    /// Dead end with a single exit
    BufferStop(Direction),
}

impl TrackShape {
    #[must_use]
    pub fn connections(self) -> Connections {
        match self {
            TrackShape::Straight(Axis::NorthSouth) => Connections::NORTH | Connections::SOUTH,
            TrackShape::Straight(Axis::EastWest) => Connections::EAST | Connections::WEST,
            TrackShape::Curve(a, b) => a.as_connection() | b.as_connection(),
            TrackShape::Junction(connections) => connections,
            TrackShape::BufferStop(dir) => dir.as_connection(),
        }
    }
}

/// One loaded track piece
///
/// The rail only caches the segment it last joined. `Segment` owns the
/// membership; the cache is refreshed by the graph whenever membership moves.
#[derive(Debug, Clone)]
pub struct Rail {
    position: Position,
    shape: TrackShape,
    links: Connections,
    segment: Option<SegmentId>,
    pub(crate) node: NodeIndex,
}

impl Rail {
    pub(crate) fn new(position: Position, shape: TrackShape, node: NodeIndex) -> Self {
        Self {
            position,
            shape,
            links: Connections::empty(),
            segment: None,
            node,
        }
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    #[must_use]
    pub fn shape(&self) -> TrackShape {
        self.shape
    }

    /// Whether this piece reaches for a neighbour in `direction`
    #[must_use]
    pub fn is_connected_to(&self, direction: Direction) -> bool {
        self.shape.connections().has(direction)
    }

    /// Directions with a mutually agreed link to a loaded neighbour
    #[must_use]
    pub fn links(&self) -> Connections {
        self.links
    }

    /// Number of linked neighbours
    #[must_use]
    pub fn degree(&self) -> usize {
        self.links.directions().count()
    }

    /// Linked neighbours keyed by direction of travel
    pub fn neighbor_rails(&self) -> impl Iterator<Item = (Direction, Position)> + '_ {
        self.links
            .directions()
            .map(move |dir| (dir, self.position.offset(dir)))
    }

    /// The linked neighbour in `direction`, if any
    #[must_use]
    pub fn rail(&self, direction: Direction) -> Option<Position> {
        self.links
            .has(direction)
            .then(|| self.position.offset(direction))
    }

    #[must_use]
    pub fn segment(&self) -> Option<SegmentId> {
        self.segment
    }

    pub(crate) fn set_segment(&mut self, segment: Option<SegmentId>) {
        self.segment = segment;
    }

    pub(crate) fn link(&mut self, direction: Direction) {
        self.links.insert(direction.as_connection());
    }

    pub(crate) fn unlink(&mut self, direction: Direction) {
        self.links.remove(direction.as_connection());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_connections() {
        assert_eq!(
            TrackShape::Straight(Axis::EastWest).connections(),
            Connections::EAST | Connections::WEST
        );
        assert_eq!(
            TrackShape::Curve(Direction::North, Direction::East).connections(),
            Connections::NORTH | Connections::EAST
        );
        assert_eq!(TrackShape::BufferStop(Direction::Up).connections(), Connections::UP);
        assert_eq!(TrackShape::Junction(Connections::LEVEL).connections(), Connections::LEVEL);
    }

    #[test]
    fn test_links_are_separate_from_shape() {
        let mut rail = Rail::new(
            Position::new(0, 0, 0),
            TrackShape::Straight(Axis::EastWest),
            NodeIndex::new(0),
        );
        assert!(rail.is_connected_to(Direction::East));
        assert_eq!(rail.rail(Direction::East), None);

        rail.link(Direction::East);
        assert_eq!(rail.rail(Direction::East), Some(Position::new(1, 0, 0)));
        let neighbors: Vec<_> = rail.neighbor_rails().collect();
        assert_eq!(neighbors, vec![(Direction::East, Position::new(1, 0, 0))]);

        rail.unlink(Direction::East);
        assert_eq!(rail.neighbor_rails().count(), 0);
    }
}
