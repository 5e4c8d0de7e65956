//! External collaborators named in spec.md §6: the CLIP-like embedder
//! service and the Drive-like external file source. Each is a trait plus
//! one `reqwest`-based adapter; their own business rules (model
//! internals, OAuth consent screens) are out of scope (spec.md §1).

mod embedder;
mod source;

pub use embedder::{EmbedderClient, HttpEmbedderClient};
pub use source::{DriveChild, HttpSourceClient, SourceClient};
