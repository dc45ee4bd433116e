use thiserror::Error;

/// Driver-level errors: the things that can go wrong before there is
/// even source text to compile. Distinct from `InterpretResult`'s
/// compile/runtime taxonomy, which is part of the language's own
/// tested contract.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("could not read '{path}': {source}")]
    ReadSource {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read a line from stdin: {0}")]
    ReplRead(#[source] std::io::Error),
}
