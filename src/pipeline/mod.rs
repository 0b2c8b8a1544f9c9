//! Stage sequencing over a working directory of MARCI images
//!
//! Runs ingest, geometry init, calibration, the optional band split, map
//! projection and export, one file at a time.

pub mod driver;
pub mod naming;
pub mod stage;
pub mod summary;

#[cfg(test)]
mod testing;

pub use driver::Driver;
