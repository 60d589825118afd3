use nodewire_io::CodeError;
use thiserror::Error;

/// A fatal problem that aborts the pass without modifying the module.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("member '{member}' of type '{type_name}' does not derive from '{base}'")]
    InvalidMemberType {
        member: String,
        type_name: String,
        base: String,
    },
    #[error("property '{member}' cannot be wired because it has no setter")]
    MissingSetter { member: String },
    #[error("static member '{member}' cannot be wired")]
    StaticMember { member: String },
    #[error("no ancestor of '{class}' implements '{method}'")]
    MissingBaseLifecycle { class: String, method: String },
    #[error("the hierarchy of '{class}' is cyclic or too deep")]
    InvalidHierarchy { class: String },
    #[error("the module does not provide the {what} '{name}'")]
    MissingRuntimeApi { what: &'static str, name: String },
    #[error("the existing helper class '{class}' has no method '{method}'")]
    InvalidHelper { class: String, method: String },
    #[error("the body of '{method}' is invalid: {source}")]
    InvalidMethodBody { method: String, source: CodeError },
    #[error("failed to assemble generated code: {0}")]
    Assembly(#[from] CodeError),
}
