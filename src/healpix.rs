//! Nested-scheme HEALPix (Hierarchical Equal Area isoLatitude Pixelisation)
//! mapping between galactic coordinates and pixel indices.
//!
//! The sphere is split into 12 base faces (0–3 north polar cap, 4–7
//! equatorial belt, 8–11 south polar cap), each subdivided into an
//! `nside` × `nside` grid. Within a face, `x` increases northeast and `y`
//! increases northwest; the sub-index interleaves the bits of (x, y).
//!
//! Only the forward/inverse mapping needed for map lookup is provided. The
//! pixelisation is lossy by construction: many sky positions share a pixel,
//! and `pixel_to_lb` is the exact inverse of `lb_to_pixel` only at pixel
//! centers.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

/// Total number of pixels at a given resolution: 12 * nside^2.
pub fn npix(nside: u32) -> u64 {
    12 * nside as u64 * nside as u64
}

/// Convert galactic (l, b) in degrees to a nested pixel index.
///
/// `l` is wrapped modulo 360°, so any finite longitude is accepted. `b` is
/// nominally in [-90, 90]; out-of-range latitudes fold back through their
/// sine rather than raising.
pub fn lb_to_pixel(nside: u32, l: f64, b: f64) -> u64 {
    let (face, x, y) = project(l.to_radians(), b.to_radians(), nside as f64);
    face * (nside as u64 * nside as u64) + interleave(x, y)
}

/// Convert a nested pixel index to the galactic (l, b) of its center,
/// in degrees.
pub fn pixel_to_lb(nside: u32, pix: u64) -> (f64, f64) {
    let ns2 = nside as u64 * nside as u64;
    let (x, y) = deinterleave(pix % ns2);
    let (lon, lat) = unproject(pix / ns2, x as f64 + 0.5, y as f64 + 0.5, nside as f64);
    (lon.to_degrees(), lat.to_degrees())
}

fn north_face(face: u64) -> bool {
    face <= 3
}

fn south_face(face: u64) -> bool {
    face >= 8
}

/// Map (lon, lat) in radians to (face, x, y) grid coordinates.
fn project(lon: f64, lat: f64, ns: f64) -> (u64, u64, u64) {
    let z = lat.sin();
    let mut phi = lon % TAU;
    if phi < 0.0 {
        phi += TAU;
    }

    // Quadrant column and offset within it.
    let col = ((phi / FRAC_PI_2).floor() as i64).rem_euclid(4) as u64;
    let phi_t = phi % FRAC_PI_2;

    let (face, gx, gy) = if z.abs() >= 2.0 / 3.0 {
        // Polar caps: eqns 19/20 of the HEALPix paper, solved for the
        // distances from the pole corner of the face.
        let zf = if z >= 0.0 { 1.0 } else { -1.0 };

        let rx = (1.0 - z * zf) * 3.0 * (ns * (2.0 * phi_t - PI) / PI).powi(2);
        let ry = (1.0 - z * zf) * 3.0 * (ns * 2.0 * phi_t / PI).powi(2);
        let dx = if rx <= 0.0 { 0.0 } else { rx.sqrt() };
        let dy = if ry <= 0.0 { 0.0 } else { ry.sqrt() };

        if z >= 0.0 {
            (col, ns - dx, ns - dy)
        } else {
            (8 + col, dy, dx)
        }
    } else {
        // Equatorial belt: rotate into the diagonal (u1, u2) frame.
        let zu = (z + 2.0 / 3.0) / (4.0 / 3.0);
        let pu = phi_t / FRAC_PI_2;

        let mut gx = (zu + pu) * ns;
        let mut gy = (zu - pu + 1.0) * ns;

        let face = if gx >= ns {
            gx -= ns;
            if gy >= ns {
                gy -= ns;
                col
            } else {
                4 + (col + 1) % 4
            }
        } else if gy >= ns {
            gy -= ns;
            4 + col
        } else {
            8 + col
        };
        (face, gx, gy)
    };

    let x = (gx.floor() as u64).min(ns as u64 - 1);
    let y = (gy.floor() as u64).min(ns as u64 - 1);
    (face, x, y)
}

/// Map (face, x, y) grid coordinates back to (lon, lat) in radians.
fn unproject(face: u64, x: f64, y: f64, ns: f64) -> (f64, f64) {
    let xn = x / ns;
    let yn = y / ns;

    // A point on a polar face may still fall in the equatorial regime; the
    // cap proper is the triangle toward the pole corner.
    let polar = (north_face(face) && xn + yn > 1.0) || (south_face(face) && xn + yn < 1.0);

    let (z, phi) = if !polar {
        let (phi_off, z_off, col) = if face <= 3 {
            (1.0, 0.0, face)
        } else if face <= 7 {
            (0.0, -1.0, face - 4)
        } else {
            (1.0, -2.0, face - 8)
        };

        let z = (2.0 / 3.0) * (xn + yn + z_off);
        let phi = FRAC_PI_4 * (xn - yn + phi_off + 2.0 * col as f64);
        (z, phi)
    } else {
        let north = north_face(face);
        let zf = if north { 1.0 } else { -1.0 };

        // South faces mirror the north-polar solution.
        let (px, py) = if north { (x, y) } else { (ns - y, ns - x) };
        let dx = ns - px;
        let dy = ns - py;

        let phi_t = if dx + dy == 0.0 {
            0.0
        } else {
            PI * dy / (2.0 * (dx + dy))
        };

        // Invert eqns 19/20, branching to keep the denominator away from zero.
        let z = if phi_t < FRAC_PI_4 {
            let denom = (2.0 * phi_t - PI) * ns;
            if denom.abs() < 1e-15 {
                zf
            } else {
                let v = PI * dx / denom;
                (1.0 - v * v / 3.0) * zf
            }
        } else {
            let denom = 2.0 * phi_t * ns;
            if denom.abs() < 1e-15 {
                zf
            } else {
                let v = PI * dy / denom;
                (1.0 - v * v / 3.0) * zf
            }
        };

        let col = if north { face } else { face - 8 };
        (z, FRAC_PI_2 * col as f64 + phi_t)
    };

    let mut lon = phi % TAU;
    if lon < 0.0 {
        lon += TAU;
    }
    if lon >= TAU {
        lon -= TAU;
    }
    (lon, z.clamp(-1.0, 1.0).asin())
}

/// Bit-interleave (x, y) into a sub-index: x fills even bits, y odd bits.
fn interleave(x: u64, y: u64) -> u64 {
    let mut sub = 0u64;
    let mut bit = 0;
    let (mut x, mut y) = (x, y);
    while x > 0 || y > 0 {
        sub |= (x & 1) << bit;
        sub |= (y & 1) << (bit + 1);
        x >>= 1;
        y >>= 1;
        bit += 2;
    }
    sub
}

/// Split a sub-index back into its (x, y) bit lanes.
fn deinterleave(sub: u64) -> (u64, u64) {
    let mut x = 0u64;
    let mut y = 0u64;
    let mut s = sub;
    let mut bit = 0;
    while s > 0 {
        x |= (s & 1) << bit;
        y |= ((s >> 1) & 1) << bit;
        s >>= 2;
        bit += 1;
    }
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npix_values() {
        assert_eq!(npix(1), 12);
        assert_eq!(npix(2), 48);
        assert_eq!(npix(8), 768);
        assert_eq!(npix(32), 12288);
    }

    #[test]
    fn interleave_roundtrip() {
        for x in 0..32 {
            for y in 0..32 {
                let (rx, ry) = deinterleave(interleave(x, y));
                assert_eq!((x, y), (rx, ry), "roundtrip failed for ({x}, {y})");
            }
        }
    }

    #[test]
    fn pixel_center_roundtrip() {
        // Pixel centers must map back to the same pixel at every index.
        for nside in [1u32, 2, 4, 8, 32] {
            for pix in 0..npix(nside) {
                let (l, b) = pixel_to_lb(nside, pix);
                assert!((0.0..360.0).contains(&l), "l={l} out of range");
                assert!((-90.0..=90.0).contains(&b), "b={b} out of range");
                assert_eq!(
                    lb_to_pixel(nside, l, b),
                    pix,
                    "nside {nside}: center of pixel {pix} did not map back"
                );
            }
        }
    }

    #[test]
    fn all_pixels_covered() {
        // A dense sky grid should reach every pixel at low resolution.
        for nside in [1u32, 2, 4, 8] {
            let mut seen = vec![false; npix(nside) as usize];
            let n = 600;
            for i in 0..n {
                let l = 360.0 * i as f64 / n as f64;
                for j in 0..n {
                    let b = -90.0 + 180.0 * j as f64 / (n - 1) as f64;
                    let pix = lb_to_pixel(nside, l, b);
                    assert!(pix < npix(nside));
                    seen[pix as usize] = true;
                }
            }
            let covered = seen.iter().filter(|&&v| v).count();
            assert_eq!(
                covered,
                npix(nside) as usize,
                "nside {nside}: only {covered} pixels covered"
            );
        }
    }

    #[test]
    fn longitude_wraps() {
        for nside in [8u32, 32] {
            for &(l, b) in &[(10.0, 42.0), (359.5, -3.0), (90.0, 88.0)] {
                let base = lb_to_pixel(nside, l, b);
                assert_eq!(lb_to_pixel(nside, l + 360.0, b), base);
                assert_eq!(lb_to_pixel(nside, l - 360.0, b), base);
                assert_eq!(lb_to_pixel(nside, l + 720.0, b), base);
            }
        }
    }

    #[test]
    fn poles() {
        for nside in [2u32, 8, 32] {
            let n = lb_to_pixel(nside, 0.0, 90.0);
            let s = lb_to_pixel(nside, 0.0, -90.0);
            assert!(n < npix(nside));
            assert!(s < npix(nside));
            let (_, bn) = pixel_to_lb(nside, n);
            let (_, bs) = pixel_to_lb(nside, s);
            assert!(bn > 60.0, "north pole center b = {bn}");
            assert!(bs < -60.0, "south pole center b = {bs}");
        }
    }

    #[test]
    fn poles_at_base_resolution() {
        // At nside 1 a base face covers a whole polar cap, so the pole
        // pixel's center sits at the face center, b = asin(2/3).
        let face_center_b = (2.0f64 / 3.0).asin().to_degrees();
        let n = lb_to_pixel(1, 0.0, 90.0);
        let s = lb_to_pixel(1, 0.0, -90.0);
        let (_, bn) = pixel_to_lb(1, n);
        let (_, bs) = pixel_to_lb(1, s);
        assert!((bn - face_center_b).abs() < 1e-9, "north face center b = {bn}");
        assert!((bs + face_center_b).abs() < 1e-9, "south face center b = {bs}");
    }
}
