//! Purpose: Define the stable public API boundary for remodel.
//! Exports: Client/session surface plus the core cache, record, and schema
//! types callers interact with.
//! Role: Public, additive-only surface; internal module layout stays hidden.
//! Invariants: This module is the only public path to the cache primitives.

mod client;
mod remote;
mod session;

pub use crate::core::cache::{FieldDict, NAME_GET_KEY, RelationalCache};
pub use crate::core::collection::{Collection, Mapped};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{ApiResult, Error, ErrorKind};
pub use crate::core::ext::{ExtRegistry, ModelExt};
pub use crate::core::gateway::{Context, Domain, Gateway, SearchOptions, SearchResult};
pub use crate::core::record::{Record, Related};
pub use crate::core::schema::{
    FieldInfo, FieldKind, ModelSchema, PathStep, SchemaCache, split_path,
};
pub use crate::core::value::{FieldValue, classify};
pub use client::{Client, ModelHandle};
pub use remote::RemoteGateway;
pub use session::{SessionEntry, SessionStore};
