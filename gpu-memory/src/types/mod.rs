//! Plain descriptions of resources, views and samplers.
//!
//! Everything in this module is a value type: descriptions are compared
//! structurally and never reference GPU state. The allocation layer turns
//! them into [`Allocation`]s and [`Descriptor`]s.
//!
//! [`Allocation`]: crate::Allocation
//! [`Descriptor`]: crate::Descriptor

mod common;
mod format;
mod resource;
mod sampler;
mod view;

pub use common::{ClearValue, Extent3d};
pub use format::Format;
pub use resource::{Residency, ResourceDescription, ResourceDimension, ResourceState, ResourceUsage};
pub use sampler::{AddressMode, CompareFunction, FilterMode, SamplerDescription};
pub use view::{
    BufferViewRange, DescriptorSpaceKind, TextureViewRange, ViewDescription, ViewDimension,
    ViewKind, ViewRange,
};
