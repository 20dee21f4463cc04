use std::path::PathBuf;

/// The closed error taxonomy shared by the parser, the command driver, and the
/// function metadata manager.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("function '{0}' not found")]
    NotFound(String),

    #[error("'{path}' is not a valid JSON object")]
    Invalid { path: PathBuf },

    #[error("unsupported status code '{code}' in porcelain line '{line}'")]
    UnsupportedStatus { code: String, line: String },

    #[error("failed to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("command driver failed running `{program} {args}` in {cwd}: {reason}")]
    Driver {
        program: String,
        args: String,
        cwd: PathBuf,
        reason: String,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operations client request to '{path}' failed: {reason}")]
    Operations { path: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn parse(what: &'static str, reason: impl Into<String>) -> Self {
        Error::Parse {
            what,
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
