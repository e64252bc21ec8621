pub mod queue_item;

pub use queue_item::{ContentKind, QueueItem};
