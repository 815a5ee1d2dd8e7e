//! Command-line front end for the `regbuild` registry build pipeline.

pub mod cli;
pub mod logging;
