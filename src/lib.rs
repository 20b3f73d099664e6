//! Bidirectional compressing stream proxy engine.
//!
//! Given two already-connected byte-stream sockets, forwards bytes from
//! one to the other while compressing in one direction and decompressing
//! in the other. Accepting connections, pre-handshake sniffing, and host
//! bindings are all out of scope here: this crate only implements the
//! per-connection forwarding engine, invoked through [`engine::run`] with
//! two descriptors and an [`options::Options`] record.

pub mod backend;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod fd;
pub mod options;
pub mod pipeline;
pub mod transform;
pub mod user_data;

pub use descriptor::Descriptor;
pub use engine::{init, run, run_in_background, Proxy};
pub use error::{ProxyError, Result};
pub use options::{Options, OptionsBuilder, RingOptions, ZstdOptions};
