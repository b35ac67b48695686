/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Filesystem backends.
 */

//! Filesystem backends for the built-in schemes.

pub mod http;
pub mod local;
pub mod memory;

pub use http::{HttpClient, HttpFs, HttpResponse, ReqwestClient};
pub use local::LocalFs;
pub use memory::MemFs;
