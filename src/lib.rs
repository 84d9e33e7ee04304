//! Astronomical survey selection functions.
//!
//! Evaluates the probability that a star at a given galactic position and
//! magnitude made it into a survey catalogue, by nearest-neighbour lookup
//! into a precomputed completeness map binned over a nested HEALPix sky
//! grid and a set of magnitude bins.

pub mod error;
pub mod healpix;
pub mod map;
pub mod selection;

pub use error::SfError;
pub use map::CompletenessMap;
pub use selection::{SelectionFunction, TgasRaveSelectionFunction, TgasSelectionFunction};
