//! Cross-crate tests for the shared-memory frame protocol.

#[cfg(all(test, not(target_arch = "wasm32")))]
mod native_e2e;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod frame_sanity;
