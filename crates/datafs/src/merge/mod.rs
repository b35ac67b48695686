/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Structured-data merge overlay.
 */

//! Structured-data merge overlay: the deep-merge algorithm and the `merge:`
//! filesystem built on it.

pub mod deep;
pub mod fs;

pub use deep::{merge_objects, merge_pair};
pub use fs::{MergeFile, MergeFs};
