//! GPU memory allocations and their upload layout.

mod allocation;
mod footprint;

pub use allocation::{Allocation, ResourceTransition};
pub use footprint::{CopyFootprint, SubresourceFootprint};

pub(crate) use footprint::align_up;
