//! Pipeline stages for receipt extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the network stage can be swapped for a fake.
//!
//! ## Data Flow
//!
//! ```text
//! preprocess ──▶ request ──▶ transport ──▶ response ──▶ parse
//!  (JPEG+b64)    (payload)    (HTTP)       (envelope)   (receipt)
//! ```
//!
//! 1. [`preprocess`] — decode, downscale and JPEG-encode the photo; CPU-bound,
//!    so the orchestrator runs it in `spawn_blocking`
//! 2. [`request`]    — pick the provider from the key and build its payload
//! 3. [`transport`]  — one HTTP POST; the only stage with network I/O
//! 4. [`response`]   — pull the assistant text out of the provider envelope
//! 5. [`parse`]      — schema-tolerant decode of the receipt JSON

pub mod parse;
pub mod preprocess;
pub mod request;
pub mod response;
pub mod transport;
