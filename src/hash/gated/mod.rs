mod lock;
mod map;

#[cfg(test)]
mod tests;

pub use lock::{MaybeLock, MaybeReadGuard, MaybeWriteGuard};
pub use map::GatedMap;
