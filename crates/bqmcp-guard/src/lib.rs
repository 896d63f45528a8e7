//! # bqmcp-guard
//!
//! Read-only policy for user-supplied SQL.
//!
//! This crate provides:
//! - A keyword denylist that rejects statements which could write or change state
//! - Qualification of `dataset.INFORMATION_SCHEMA.TABLES` references to a
//!   fully-qualified, quoted `project.dataset` path
//!
//! ## Limitations
//!
//! The denylist is syntactic, not a parser. It over-rejects (a `SELECT` whose
//! string literal contains the word `delete`) and under-rejects (write paths the
//! keyword list does not name, such as dialect-specific procedures). Both are
//! accepted behaviour and pinned by tests.
//!
//! | Input | Result |
//! |-------|--------|
//! | `SELECT * FROM t` | safe |
//! | `SELECT updated_at FROM t` | safe |
//! | `select * from t; DROP TABLE t` | rejected |
//! | `SELECT * FROM ds.INFORMATION_SCHEMA.TABLES` | rewritten to `` `proj.ds.INFORMATION_SCHEMA.TABLES` `` |
//! | `SELECT * FROM INFORMATION_SCHEMA.TABLES` | rejected, dataset required |

pub mod classify;
pub mod error;
pub mod qualify;

pub use classify::{Classification, FORBIDDEN_KEYWORDS, READ_ONLY_VIOLATION, SqlGuard};
pub use error::GuardError;
pub use qualify::{QUALIFIED_VIEWS, mentions_information_schema};
