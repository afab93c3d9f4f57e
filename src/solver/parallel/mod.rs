mod group;
mod pdfpn;

pub use group::{GroupConfig, Job, ParallelGroup};
pub use pdfpn::ParallelDfpn;
