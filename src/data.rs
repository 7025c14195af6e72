//! Conversions from coordinate arrays to the flat layouts the daemon expects.
//!
//! Series values travel as interleaved `f32` tuples: `[x0, y0, x1, y1, ...]`
//! for 2D series and `[x0, y0, z0, ...]` for 3D ones.

use crate::error::{Result, SpectraError};

/// Interleave two equally long coordinate arrays.
///
/// # Example
///
/// ```
/// use spectra_client::data::interleave_xy;
///
/// let flat = interleave_xy(&[1.0, 2.0], &[10.0, 20.0]).unwrap();
/// assert_eq!(flat, vec![1.0, 10.0, 2.0, 20.0]);
/// ```
pub fn interleave_xy(x: &[f32], y: &[f32]) -> Result<Vec<f32>> {
    check_len(x.len(), y.len())?;
    let mut out = Vec::with_capacity(x.len() * 2);
    for (xv, yv) in x.iter().zip(y) {
        out.push(*xv);
        out.push(*yv);
    }
    Ok(out)
}

/// Interleave three equally long coordinate arrays.
pub fn interleave_xyz(x: &[f32], y: &[f32], z: &[f32]) -> Result<Vec<f32>> {
    check_len(x.len(), y.len())?;
    check_len(x.len(), z.len())?;
    let mut out = Vec::with_capacity(x.len() * 3);
    for ((xv, yv), zv) in x.iter().zip(y).zip(z) {
        out.extend_from_slice(&[*xv, *yv, *zv]);
    }
    Ok(out)
}

/// Pack values as little-endian `f32` bytes, the raw transfer layout.
pub fn f32_to_le_bytes(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(SpectraError::LengthMismatch { expected, actual });
    }
    Ok(())
}
