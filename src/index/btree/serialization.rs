mod encoding;
mod decoding;
mod order;

pub use encoding::serialize_node;
pub use decoding::deserialize_node;
pub use order::{default_internal_max_size, default_leaf_max_size};
