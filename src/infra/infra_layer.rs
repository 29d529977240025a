// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "inactivity/inactivity_store.rs"]
pub mod inactivity;
