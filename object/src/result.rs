//! The writer's slice of the error taxonomy (spec §7's "IO / object write
//! failure" row): "no partial file is left on disk" is the caller's job
//! (write to a temp path and rename), not this crate's — `finish` only
//! ever hands back a complete in-memory buffer or an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("duplicate definition of symbol `{0}`")]
    DuplicateDefinition(String),
    #[error("relocation in `{0}` references undefined external `{1}` but unresolved externals were not requested")]
    UnresolvedExternal(String, String),
    #[error("object write failed: {0}")]
    Write(#[from] object::write::Error),
}

pub type ObjectResult<T> = Result<T, ObjectError>;
