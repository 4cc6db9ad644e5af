// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Typed, mipmap-aware memory allocations mirrored lazily to the GPU.
//!
//! An [`allocation::Allocation`] owns a CPU buffer shaped by a
//! [`types::Type`] (an [`element::Element`] repeated over up to three
//! dimensions, optional cube faces and an optional mip chain). Writes are
//! validated against that shape, keep object reference counts balanced, and
//! mark the GPU mirror stale. Pushing to the GPU is a separate, explicit
//! step through an [`gpu::backend::UploadBackend`].
//!
//! # Key entry points
//!
//! - [`allocation::Allocation`] - the buffer, its writes, uploads and
//!   serialization
//! - [`context::Context`] - error channel, object table and options shared
//!   by allocations
//! - [`adapter::Adapter2D`] - strided view of one face and level
//! - [`mip`] - box-filter mip generation
//! - [`gpu::wgpu_backend::WgpuBackend`] /
//!   [`gpu::recording::RecordingBackend`] - upload sinks
//! - [`options::Options`] - TOML-backed upload and debug policy

pub mod adapter;
pub mod allocation;
pub mod context;
pub mod element;
pub mod error;
pub mod gpu;
pub mod mip;
pub mod options;
pub mod stream;
pub mod types;

pub use allocation::{Allocation, MipmapControl, SyncOutcome, Usage};
pub use context::Context;
pub use error::{AllocationError, ErrorKind};
