#![doc = include_str!("../README.md")]

mod context;
mod error;
mod pool;
mod registry;
mod runtime;
mod slot;
mod status;
mod task;


pub use crate::context::*;
pub use crate::error::*;
pub use crate::pool::*;
pub use crate::registry::*;
pub use crate::runtime::*;
pub use crate::slot::SlotId;
pub use crate::status::*;
pub use crate::task::{FailureCallback, SuccessCallback, Task};
