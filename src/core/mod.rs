// Core modules implementing the relational cache, schema introspection,
// record/collection views, and error modeling.
pub mod cache;
pub mod collection;
pub mod error;
pub mod ext;
pub mod gateway;
pub mod record;
pub mod schema;
pub mod value;

#[cfg(test)]
pub(crate) mod testutil;
