//! Schema introspection trait.
//!
//! Anything that can produce a [`Schema`] snapshot implements
//! [`Introspect`]: a static snapshot file, a captured fixture, or a schema
//! value already in memory. Live database readers live in the tool crate so
//! this crate stays free of I/O.

use std::convert::Infallible;

use crate::schema::Schema;

/// Produces a [`Schema`] snapshot.
pub trait Introspect {
    /// Error type for introspection failures.
    type Error: std::error::Error;

    /// Reads the schema and returns a snapshot.
    fn introspect_schema(&self) -> Result<Schema, Self::Error>;
}

impl Introspect for Schema {
    type Error = Infallible;

    fn introspect_schema(&self) -> Result<Schema, Self::Error> {
        Ok(self.clone())
    }
}
