mod file;
mod snapshot;

pub use file::{
    create_snapshot_filename, deserialize_snapshot_from_bytes, load_graph, save_graph, serialize_snapshot_to_bytes,
};
pub use snapshot::{GraphSnapshot, RailRecord, SegmentRecord};
