pub mod config;
pub mod error;
pub mod game;
pub mod games;
pub mod solver;
pub mod stats;

pub use config::{Algorithm, SolverConfig};
pub use error::{SolverError, SolverResult};
pub use game::{Game, Outcome};
pub use solver::{Couple, Nimber, PnsSolver};
