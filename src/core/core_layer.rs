// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "inactivity/mod.rs"]
pub mod inactivity;
