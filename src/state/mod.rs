//! Control binding layer and live control state.

pub mod binding;
pub mod control;
pub mod value;

pub use binding::{BindingContext, bind_controls};
pub use control::{ControlSet, ControlState};
