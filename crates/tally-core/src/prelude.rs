//! Convenience re-exports for common tally-core types.
//!
//! ```rust
//! use tally_core::prelude::*;
//! ```

pub use crate::Tensor;
pub use crate::DType;
pub use crate::Element;
pub use crate::Device;
pub use crate::Shape;
pub use crate::TallyError;
pub use crate::Result;
