pub mod cursor;
pub mod document;
pub mod errors;
pub mod node;
pub mod operations;
mod parser;
pub mod render;

pub use document::Document;
pub use errors::YamlError;
pub use node::{Entry, Item, Layout, Mapping, Node, Null, Scalar, ScalarStyle, Sequence, Slot};
pub use operations::{
    append_items, insert_entry, merge, merge_mapping, prune_fields, prune_slot, prune_tree,
    rename_scalar, Placement,
};
pub use cursor::MappingCursor;
pub use render::Fragment;
