#![allow(clippy::missing_errors_doc)]

mod domain;
mod error;
mod ids;
mod settings;

pub use domain::*;
pub use error::*;
pub use ids::*;
pub use settings::*;
