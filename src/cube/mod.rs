//! The cube: dimension hierarchy, cells, and the store that maps keys to
//! cells

/// Dimensions, hierarchies and cell keys
pub mod dimension;
/// A single cube cell
pub mod cell;
/// Key-to-cell mapping
pub mod store;

pub use cell::Cell;
pub use dimension::{Dimension, DimensionHierarchy, DimensionKey};
pub use store::{CubeRow, CubeStore};
