mod blocking_state;
mod position;
mod rail;
mod rail_graph;
mod segment;
mod segment_pool;
mod signal;
mod train;

pub use blocking_state::{BlockingState, SignalAspect};
pub use position::{Connections, Direction, Position, RegionKey};
pub use rail::{Axis, Rail, TrackShape};
pub use rail_graph::{Link, LinkOutcome, PendingUpdates, RailGraph, Rails, Regions, Reservations, Signals};
pub use segment::{Segment, SegmentId};
pub use segment_pool::SegmentPool;
pub use signal::{RailSignal, SignalEvent, SignalKey, SignalTable};
pub use train::TrainId;
