mod cookie;
mod core;
mod gc;

pub use self::core::{DestroyOutcome, MAX_ID_ATTEMPTS, Manager};
pub use gc::GcHandle;
