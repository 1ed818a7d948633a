//! Render registry and the surface it mirrors onto.

pub mod registry;
pub mod surface;

pub use registry::{Node, NodeHandle, Registry};
pub use surface::{MemorySurface, Surface, SurfaceOp};
