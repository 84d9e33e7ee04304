//! Completeness map storage: the per-pixel, per-magnitude-bin detection
//! fractions a selection function is evaluated against.
//!
//! A map is a `(num_pixels, num_bins)` grid plus the magnitude value of each
//! bin. The HEALPix resolution is never stored; it is derived from the pixel
//! count, which must be `12 * nside^2` for a power-of-two `nside`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::SfError;

const MAGIC: &[u8; 4] = b"SFMP";
const VERSION: u32 = 1;

fn write_u32(w: &mut impl Write, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u64(w: &mut impl Write, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_f64(w: &mut impl Write, v: f64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64(r: &mut impl Read) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// A loaded completeness map. Immutable after construction.
#[derive(Clone)]
pub struct CompletenessMap {
    /// Completeness fraction per (pixel, magnitude bin).
    grid: Array2<f64>,
    /// Magnitude value of each bin, one per grid column.
    mag_bins: Array1<f64>,
    /// HEALPix resolution, derived from the grid's pixel count.
    nside: u32,
}

impl CompletenessMap {
    /// Build a map from a grid and its magnitude bins, deriving the HEALPix
    /// resolution from the pixel count.
    pub fn new(grid: Array2<f64>, mag_bins: Array1<f64>) -> Result<Self, SfError> {
        if mag_bins.is_empty() {
            return Err(SfError::MalformedMap("no magnitude bins".into()));
        }
        if grid.ncols() != mag_bins.len() {
            return Err(SfError::MalformedMap(format!(
                "grid has {} columns but there are {} magnitude bins",
                grid.ncols(),
                mag_bins.len()
            )));
        }

        let nside = derive_nside(grid.nrows() as u64)?;
        Ok(Self {
            grid,
            mag_bins,
            nside,
        })
    }

    /// Read a map from a file. The file handle is closed before returning,
    /// whether or not the read succeeds.
    pub fn load(path: &Path) -> Result<Self, SfError> {
        let file = File::open(path)?;
        let mut r = BufReader::new(file);

        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(SfError::MalformedMap("invalid magic bytes".into()));
        }

        let version = read_u32(&mut r)?;
        if version != VERSION {
            return Err(SfError::MalformedMap(format!(
                "unsupported version: {version}"
            )));
        }

        let num_pixels = read_u64(&mut r)? as usize;
        let num_bins = read_u64(&mut r)? as usize;

        // Reject a corrupt header before allocating for its claimed sizes.
        derive_nside(num_pixels as u64)?;

        let mut mag_bins = Vec::with_capacity(num_bins);
        for _ in 0..num_bins {
            mag_bins.push(read_f64(&mut r)?);
        }

        let mut values = Vec::with_capacity(num_pixels * num_bins);
        for _ in 0..num_pixels * num_bins {
            values.push(read_f64(&mut r)?);
        }

        let grid = Array2::from_shape_vec((num_pixels, num_bins), values)
            .map_err(|e| SfError::MalformedMap(e.to_string()))?;
        Self::new(grid, Array1::from_vec(mag_bins))
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);

        w.write_all(MAGIC)?;
        write_u32(&mut w, VERSION)?;
        write_u64(&mut w, self.grid.nrows() as u64)?;
        write_u64(&mut w, self.grid.ncols() as u64)?;

        for &m in self.mag_bins.iter() {
            write_f64(&mut w, m)?;
        }
        for &v in self.grid.iter() {
            write_f64(&mut w, v)?;
        }

        w.flush()
    }

    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn num_pixels(&self) -> usize {
        self.grid.nrows()
    }

    pub fn num_bins(&self) -> usize {
        self.grid.ncols()
    }

    pub fn mag_bins(&self) -> &Array1<f64> {
        &self.mag_bins
    }

    /// Smallest stored bin magnitude. Bins are not required to be sorted.
    pub fn min_mag(&self) -> f64 {
        self.mag_bins.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest stored bin magnitude.
    pub fn max_mag(&self) -> f64 {
        self.mag_bins
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Index of the bin nearest to `mag` in absolute difference. Ties go to
    /// the lower index.
    pub fn nearest_bin(&self, mag: f64) -> usize {
        let mut best = 0;
        let mut best_diff = f64::INFINITY;
        for (i, &bin) in self.mag_bins.iter().enumerate() {
            let diff = (bin - mag).abs();
            if diff < best_diff {
                best = i;
                best_diff = diff;
            }
        }
        best
    }

    /// Stored completeness at one (pixel, bin) address.
    pub fn value(&self, pix: u64, bin: usize) -> f64 {
        self.grid[[pix as usize, bin]]
    }

    /// One column of the grid: completeness in every pixel at one bin.
    pub fn bin_column(&self, bin: usize) -> ArrayView1<'_, f64> {
        self.grid.column(bin)
    }

    /// Mean completeness over all pixels, one value per bin.
    pub fn bin_means(&self) -> Array1<f64> {
        let np = self.grid.nrows() as f64;
        self.grid.sum_axis(ndarray::Axis(0)) / np
    }
}

impl std::fmt::Debug for CompletenessMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletenessMap")
            .field("nside", &self.nside)
            .field("num_pixels", &self.num_pixels())
            .field("num_bins", &self.num_bins())
            .finish()
    }
}

/// Recover nside from a pixel count, requiring exactly `12 * k^2` pixels for
/// a power-of-two `k`. The reference derivation truncated silently; here a
/// count that does not factor is a corrupt map.
fn derive_nside(num_pixels: u64) -> Result<u32, SfError> {
    let k = ((num_pixels as f64 / 12.0).sqrt()).round() as u64;
    if k == 0 || 12 * k * k != num_pixels {
        return Err(SfError::MalformedMap(format!(
            "pixel count {num_pixels} is not 12 * nside^2"
        )));
    }
    if !k.is_power_of_two() {
        return Err(SfError::MalformedMap(format!(
            "derived nside {k} is not a power of two"
        )));
    }
    Ok(k as u32)
}
