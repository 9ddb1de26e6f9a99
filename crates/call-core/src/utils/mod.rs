pub mod mmi;
pub mod number;

pub use mmi::{MmiAction, MmiCode, MmiCodeInfo, MmiCodeResult};
pub use number::{DialString, PostDialSplit};
