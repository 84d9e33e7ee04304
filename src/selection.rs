//! Selection function evaluation: nearest-neighbour lookup of survey
//! completeness by sky position and magnitude.
//!
//! `SelectionFunction` is the shared lookup core over one completeness map.
//! The survey-specific types compose it rather than subclassing: each picks
//! the packaged map for its survey, and the TGAS-RAVE variant layers a
//! colour/latitude cut on top of the base lookup.

use std::path::{Path, PathBuf};

use ndarray::Array1;

use crate::error::SfError;
use crate::healpix;
use crate::map::CompletenessMap;

/// Lookup core over one completeness map. Queries never mutate state, so a
/// shared reference can be used freely across threads.
#[derive(Debug, Clone)]
pub struct SelectionFunction {
    map: CompletenessMap,
}

impl SelectionFunction {
    /// Load a map file and wrap it for evaluation.
    pub fn from_path(path: &Path) -> Result<Self, SfError> {
        Ok(Self {
            map: CompletenessMap::load(path)?,
        })
    }

    pub fn from_map(map: CompletenessMap) -> Self {
        Self { map }
    }

    pub fn nside(&self) -> u32 {
        self.map.nside()
    }

    pub fn map(&self) -> &CompletenessMap {
        &self.map
    }

    /// Single-point lookup: clamp the magnitude to the stored bin range,
    /// map (l, b) to a pixel, pick the nearest bin, gather.
    fn lookup(&self, l: f64, b: f64, mag: f64) -> f64 {
        let pix = healpix::lb_to_pixel(self.map.nside(), l, b);
        let bin = self
            .map
            .nearest_bin(mag.clamp(self.map.min_mag(), self.map.max_mag()));
        self.map.value(pix, bin)
    }

    /// Evaluate the selection function at each (l, b, mag) triple.
    ///
    /// `l` and `b` are galactic coordinates in degrees, `mag` the magnitude
    /// to look up. All slices must have the same length. Magnitudes outside
    /// the stored bin range use the completeness at the nearest edge bin.
    pub fn evaluate(&self, l: &[f64], b: &[f64], mag: &[f64]) -> Result<Vec<f64>, SfError> {
        check_len(l.len(), b.len())?;
        check_len(l.len(), mag.len())?;

        Ok((0..l.len())
            .map(|i| self.lookup(l[i], b[i], mag[i]))
            .collect())
    }

    /// Scalar form of [`evaluate`](Self::evaluate).
    pub fn evaluate_one(&self, l: f64, b: f64, mag: f64) -> f64 {
        self.lookup(l, b, mag)
    }

    /// Completeness in every sky pixel at the bin nearest to `mag`.
    ///
    /// Unlike point evaluation this rejects magnitudes outside the stored
    /// range instead of clamping: a slice at a magnitude the map knows
    /// nothing about is a caller bug, not an edge query.
    pub fn sky_slice(&self, mag: f64) -> Result<Array1<f64>, SfError> {
        let min = self.map.min_mag();
        let max = self.map.max_mag();
        if mag < min || mag > max {
            return Err(SfError::MagnitudeOutOfRange { mag, min, max });
        }
        Ok(self.map.bin_column(self.map.nearest_bin(mag)).to_owned())
    }

    /// Magnitude bins and the mean completeness over all pixels at each bin.
    pub fn magnitude_profile(&self) -> (Array1<f64>, Array1<f64>) {
        (self.map.mag_bins().clone(), self.map.bin_means())
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), SfError> {
    if expected != actual {
        return Err(SfError::LengthMismatch { expected, actual });
    }
    Ok(())
}

/// Resolutions the packaged survey maps ship at.
const PACKAGED_NSIDES: [u32; 2] = [8, 32];

fn packaged_map_path(maps_dir: &Path, stem: &str, nside: u32) -> Result<PathBuf, SfError> {
    // Checked before any file access.
    if !PACKAGED_NSIDES.contains(&nside) {
        return Err(SfError::UnsupportedNside(nside));
    }
    Ok(maps_dir.join(format!("{stem}_nside{nside}.sfmap")))
}

/// Selection function for the TGAS sample as a function of 2MASS J band.
#[derive(Debug, Clone)]
pub struct TgasSelectionFunction {
    sf: SelectionFunction,
}

impl TgasSelectionFunction {
    pub const SURVEY: &'static str = "TGAS";
    pub const MAGNITUDE_BAND: &'static str = "J";

    /// Load the packaged TGAS map at the given resolution (8 or 32) from
    /// `maps_dir`.
    pub fn new(maps_dir: &Path, nside: u32) -> Result<Self, SfError> {
        let path = packaged_map_path(maps_dir, "tycho2", nside)?;
        Ok(Self {
            sf: SelectionFunction::from_path(&path)?,
        })
    }

    pub fn nside(&self) -> u32 {
        self.sf.nside()
    }

    pub fn evaluate(&self, l: &[f64], b: &[f64], mag: &[f64]) -> Result<Vec<f64>, SfError> {
        self.sf.evaluate(l, b, mag)
    }

    pub fn evaluate_one(&self, l: f64, b: f64, mag: f64) -> f64 {
        self.sf.evaluate_one(l, b, mag)
    }

    pub fn sky_slice(&self, mag: f64) -> Result<Array1<f64>, SfError> {
        self.sf.sky_slice(mag)
    }

    pub fn magnitude_profile(&self) -> (Array1<f64>, Array1<f64>) {
        self.sf.magnitude_profile()
    }
}

/// Selection function for the TGAS-RAVE sample as a function of 2MASS J band
/// and J-K colour.
///
/// RAVE targets satisfy a colour cut at low galactic latitude that the
/// stored map does not encode, so evaluation takes a fourth input and zeroes
/// every point failing the cut.
#[derive(Debug, Clone)]
pub struct TgasRaveSelectionFunction {
    sf: SelectionFunction,
}

impl TgasRaveSelectionFunction {
    pub const SURVEY: &'static str = "TGAS-RAVE";
    pub const MAGNITUDE_BAND: &'static str = "J";
    pub const COLOR: &'static str = "J-K";

    /// Load the packaged TGAS-RAVE map at the given resolution (8 or 32)
    /// from `maps_dir`.
    pub fn new(maps_dir: &Path, nside: u32) -> Result<Self, SfError> {
        let path = packaged_map_path(maps_dir, "tgas_rave", nside)?;
        Ok(Self {
            sf: SelectionFunction::from_path(&path)?,
        })
    }

    pub fn nside(&self) -> u32 {
        self.sf.nside()
    }

    /// Evaluate at each (l, b, mag, color) quadruple.
    ///
    /// Runs the base lookup, then forces the result to zero wherever
    /// |b| < 25 and color < 0.5 (both strict). The cut tests the caller's b
    /// and color as supplied, after the magnitude clamp and pixel lookup
    /// have already happened.
    pub fn evaluate(
        &self,
        l: &[f64],
        b: &[f64],
        mag: &[f64],
        color: &[f64],
    ) -> Result<Vec<f64>, SfError> {
        check_len(l.len(), color.len())?;
        let mut out = self.sf.evaluate(l, b, mag)?;
        for ((v, &bi), &ci) in out.iter_mut().zip(b).zip(color) {
            if bi.abs() < 25.0 && ci < 0.5 {
                *v = 0.0;
            }
        }
        Ok(out)
    }

    /// Scalar form of [`evaluate`](Self::evaluate).
    pub fn evaluate_one(&self, l: f64, b: f64, mag: f64, color: f64) -> f64 {
        let v = self.sf.evaluate_one(l, b, mag);
        if b.abs() < 25.0 && color < 0.5 { 0.0 } else { v }
    }

    pub fn sky_slice(&self, mag: f64) -> Result<Array1<f64>, SfError> {
        self.sf.sky_slice(mag)
    }

    pub fn magnitude_profile(&self) -> (Array1<f64>, Array1<f64>) {
        self.sf.magnitude_profile()
    }
}
