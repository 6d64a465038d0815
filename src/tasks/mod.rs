//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a shared cache.
//!
//! # Tasks
//! - Prune: Removes expired cache entries at configured intervals

mod prune;

pub use prune::spawn_prune_task;
