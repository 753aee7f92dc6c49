//! Declarative connector data model.

mod connector;

pub use connector::*;
