//! Default `serialVersionUID` computation for compiled JVM classes.
//!
//! ```text
//! class bytes -> reader::read -> ClassDescriptor -> canonical::canonicalize -> hasher::hash -> i64
//! ```
//!
//! The pipeline is pure: no I/O, no shared state, safe to run from any number of
//! threads at once. Locating and loading class files lives in [`artifact`] and the
//! binary; the core only ever sees bytes or a prebuilt [`ClassDescriptor`].

pub mod artifact;
pub mod cache;
pub mod canonical;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod hasher;
pub mod modifiers;
pub mod mutf8;
pub mod reader;
pub mod report;
pub mod scanner;

pub use canonical::Grammar;
pub use descriptor::{ClassDescriptor, FieldInfo, MethodInfo};
pub use error::{CanonicalError, CoreError, ErrorKind, HashError, ReadError};

/// Structural id of one class file, using the default grammar.
pub fn compute_structural_id(bytes: &[u8]) -> Result<i64, CoreError> {
    compute_structural_id_with(bytes, Grammar::default())
}

pub fn compute_structural_id_with(bytes: &[u8], grammar: Grammar) -> Result<i64, CoreError> {
    let desc = reader::read(bytes)?;
    id_of(&desc, grammar)
}

/// Structural id of a descriptor supplied by a compiler front-end instead of class bytes.
pub fn compute_structural_id_from_descriptor(
    desc: &ClassDescriptor,
    grammar: Grammar,
) -> Result<i64, CoreError> {
    desc.validate()?;
    id_of(desc, grammar)
}

fn id_of(desc: &ClassDescriptor, grammar: Grammar) -> Result<i64, CoreError> {
    let canonical = canonical::canonicalize_with(desc, grammar)?;
    let id = hasher::hash(&canonical)?;
    tracing::trace!(class = %desc.binary_name, %grammar, id, "computed structural id");
    Ok(id)
}
