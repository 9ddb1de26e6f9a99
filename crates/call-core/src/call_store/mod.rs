pub mod guard;
pub mod store;

pub use guard::RecordGuard;
pub use store::{CallStore, RemoveOutcome, StoreStats};
