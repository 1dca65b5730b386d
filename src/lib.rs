//! A search and query engine over a linguistically annotated text corpus.
//!
//! The crate is organized the way the index pipeline itself flows:
//!
//! - [`core`] — shared types (`DocumentId`, `Position`, `Value`), the error
//!   taxonomy, configuration, and the `DocumentStore`/`AnnotationStore`
//!   collaborator traits the rest of the crate depends on but does not
//!   implement (ingestion is out of scope).
//! - [`storage`] — the ordered key/value engine an index set is built on,
//!   its on-disk layout, file locking, and the atomic stage-then-publish
//!   build protocol.
//! - [`synonym`] — string-to-id tables backing the stitched indexes.
//! - [`index`] — the generators that turn token/dependency annotations into
//!   position lists, and the manager that opens a built index set.
//! - [`temporal`] — the Nash interval index used by temporal joins and
//!   `DATE` conditions.
//! - [`query`] — the query language: lexer, parser, semantic validator,
//!   condition executors, the join engine, and result table assembly.
//!
//! None of these modules open a logging subscriber or read configuration
//! files on their own; callers (the binaries under `demos/`, or embedding
//! applications) own that.

pub mod core;
pub mod index;
pub mod query;
pub mod storage;
pub mod synonym;
pub mod temporal;

pub use crate::core::config::IndexSetConfig;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::index::IndexSetManager;
pub use crate::query::{assemble, execute, parse, AssembleContext, ExecutedQuery, ExecutionContext, Query, ResultTable};
