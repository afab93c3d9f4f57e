use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum SolverError {
    InvalidInput(String),
    Overflow,
    Underflow,
    UndefinedSubtraction,
    DivisionByZero,
    JobNotOpen(String),
    Io { path: PathBuf, source: io::Error },
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(input) => write!(f, "invalid input: {input}"),
            Self::Overflow => write!(f, "proof number overflow"),
            Self::Underflow => write!(f, "proof number underflow"),
            Self::UndefinedSubtraction => write!(f, "undefined proof number subtraction"),
            Self::DivisionByZero => write!(f, "proof number division by zero"),
            Self::JobNotOpen(job) => write!(f, "job not open in the master tree: {job}"),
            Self::Io { path, source } => write!(f, "io error on {}: {source}", path.display()),
        }
    }
}

impl Error for SolverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
