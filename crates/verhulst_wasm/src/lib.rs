//! WebAssembly bindings for `verhulst_core`.
//!
//! A `WasmMap` wraps one iterated map and exposes every diagram the core
//! library can build for it. Settings cross the boundary as plain JS objects;
//! any field left out takes its Rust default.

mod analysis;
mod diagrams;
mod map;

pub use map::WasmMap;
