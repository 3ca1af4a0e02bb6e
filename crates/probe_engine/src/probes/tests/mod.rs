//! Integration tests driving the full probe pipeline
//!
//! Unit tests live next to their modules; these cover cross-module flows:
//! selection ordering through the manager, draw-time constant binding on
//! both shading paths, and bake/release lifecycles against the null device.

mod binding;
mod selection;
