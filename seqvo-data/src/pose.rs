//! Rigid-transform algebra on SE(3) and SO(3).
//!
//! Poses are homogeneous 4x4 matrices in double precision. The relative motion
//! between two frames is expressed as a translation plus an axis-angle rotation
//! vector, obtained through the SO(3) logarithm.

use glam::{DMat3, DMat4, DVec3};
use thiserror::Error;

/// Determinants below this magnitude are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;
/// Below this angle the logarithm falls back to its first-order expansion.
const SMALL_ANGLE: f64 = 1e-8;
/// Within this distance of pi the axis is recovered from the symmetric part.
const NEAR_PI: f64 = 1e-4;
const POLAR_TOLERANCE: f64 = 1e-13;
const POLAR_MAX_ITERATIONS: usize = 32;
/// Largest entry of `RᵀR − I` accepted from the polar iteration.
const ORTHONORMAL_TOLERANCE: f64 = 1e-10;

/// Errors produced by pose algebra on invalid input.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PoseError {
    #[error("transform is not invertible (determinant {determinant:e})")]
    Singular { determinant: f64 },

    #[error("matrix is not close to a proper rotation (determinant {determinant:e})")]
    Degenerate { determinant: f64 },
}

/// Motion of frame k expressed in frame k-1: translation plus rotation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativePose {
    /// Translation of frame k in frame k-1 coordinates.
    pub translation: DVec3,
    /// Axis-angle rotation vector (axis scaled by angle in radians).
    pub rotation: DVec3,
}

impl RelativePose {
    /// `[tx, ty, tz, rx, ry, rz]`
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.translation.x,
            self.translation.y,
            self.translation.z,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        ]
    }

    /// Same layout as [`RelativePose::to_array`], narrowed for f32 consumers.
    pub fn to_f32_array(&self) -> [f32; 6] {
        self.to_array().map(|v| v as f32)
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f64 {
        self.rotation.length()
    }
}

/// Rotation block of a homogeneous transform.
pub fn rotation(transform: &DMat4) -> DMat3 {
    DMat3::from_mat4(*transform)
}

/// Translation column of a homogeneous transform.
pub fn translation(transform: &DMat4) -> DVec3 {
    transform.w_axis.truncate()
}

/// Assemble a homogeneous transform from a rotation block and translation.
pub fn from_parts(rotation: DMat3, translation: DVec3) -> DMat4 {
    DMat4::from_cols(
        rotation.x_axis.extend(0.0),
        rotation.y_axis.extend(0.0),
        rotation.z_axis.extend(0.0),
        translation.extend(1.0),
    )
}

/// Inverse of a homogeneous transform.
///
/// For a rigid transform with bottom row `[0, 0, 0, 1]` the determinant of the
/// full matrix equals that of the rotation block, so a vanishing determinant
/// means the rotation block cannot be inverted.
pub fn invert(transform: &DMat4) -> Result<DMat4, PoseError> {
    let determinant = transform.determinant();
    if !determinant.is_finite() || determinant.abs() < SINGULAR_EPSILON {
        return Err(PoseError::Singular { determinant });
    }
    Ok(transform.inverse())
}

/// Transform of `b` expressed in the frame of `a`, i.e. `a⁻¹ · b`.
pub fn compose(a: &DMat4, b: &DMat4) -> Result<DMat4, PoseError> {
    Ok(invert(a)? * *b)
}

/// Project a near-rotation onto the closest proper rotation.
///
/// Runs the determinant-scaled Newton polar iteration
/// `R ← ½(γR + (γR)⁻ᵀ)` with `γ = |det R|^(-1/3)`, which converges to the
/// orthogonal polar factor in a handful of steps even for badly conditioned
/// input and keeps the sign of the determinant. A matrix that is already a
/// rotation is a fixed point. Input on which the iteration does not settle
/// on an orthonormal matrix is reported as degenerate.
pub fn reorthogonalize(matrix: &DMat3) -> Result<DMat3, PoseError> {
    let determinant = matrix.determinant();
    // Also rejects NaN.
    if !(determinant > SINGULAR_EPSILON) {
        return Err(PoseError::Degenerate { determinant });
    }

    let mut current = *matrix;
    for _ in 0..POLAR_MAX_ITERATIONS {
        let gamma = current.determinant().abs().cbrt().recip();
        let scaled = current * gamma;
        let next = (scaled + scaled.inverse().transpose()) * 0.5;
        let delta = max_abs_difference(&next, &current);
        current = next;
        if delta < POLAR_TOLERANCE {
            break;
        }
    }

    let orthonormality = max_abs_difference(&(current.transpose() * current), &DMat3::IDENTITY);
    if !current.is_finite()
        || !(orthonormality < ORTHONORMAL_TOLERANCE)
        || !(current.determinant() > 0.0)
    {
        return Err(PoseError::Degenerate { determinant });
    }
    Ok(current)
}

/// Re-orthogonalize the rotation block of a transform, leaving translation as is.
pub fn reorthogonalize_transform(transform: &DMat4) -> Result<DMat4, PoseError> {
    let fixed = reorthogonalize(&rotation(transform))?;
    Ok(from_parts(fixed, translation(transform)))
}

/// Skew-symmetric matrix `[v]ₓ` such that `[v]ₓ w = v × w`.
pub fn hat(v: DVec3) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, v.z, -v.y),
        DVec3::new(-v.z, 0.0, v.x),
        DVec3::new(v.y, -v.x, 0.0),
    )
}

/// SO(3) exponential: rotation vector to rotation matrix (Rodrigues).
pub fn exp_rotation(v: DVec3) -> DMat3 {
    let angle = v.length();
    if angle < SMALL_ANGLE {
        return DMat3::IDENTITY + hat(v);
    }
    DMat3::from_axis_angle(v / angle, angle)
}

/// SO(3) logarithm: rotation matrix to rotation vector.
///
/// The branch is chosen from the angle recovered from the trace. Near zero the
/// first-order term is used; near pi `sin θ` vanishes, so the axis is read from
/// the symmetric part `cos θ·I + (1 − cos θ)·aaᵀ` instead and its sign is taken
/// from the skew part.
pub fn log_rotation(r: &DMat3) -> DVec3 {
    let m = |row: usize, col: usize| r.col(col)[row];
    let skew = DVec3::new(m(2, 1) - m(1, 2), m(0, 2) - m(2, 0), m(1, 0) - m(0, 1));

    let trace = m(0, 0) + m(1, 1) + m(2, 2);
    let cos_theta = ((trace - 1.0) * 0.5).clamp(-1.0, 1.0);
    let theta = cos_theta.acos();

    if theta < SMALL_ANGLE {
        return skew * 0.5;
    }

    if std::f64::consts::PI - theta < NEAR_PI {
        let scale = 1.0 - cos_theta;
        let outer = |i: usize, j: usize| {
            let sym = 0.5 * (m(i, j) + m(j, i));
            let diag = if i == j { cos_theta } else { 0.0 };
            (sym - diag) / scale
        };

        let k = (0..3)
            .max_by(|&a, &b| outer(a, a).total_cmp(&outer(b, b)))
            .unwrap_or(0);
        let pivot = outer(k, k).max(0.0).sqrt();
        let mut axis = DVec3::ZERO;
        for j in 0..3 {
            axis[j] = if j == k { pivot } else { outer(k, j) / pivot };
        }
        let axis = axis.normalize_or_zero();
        let axis = if axis.dot(skew) < 0.0 { -axis } else { axis };
        return axis * theta;
    }

    skew * (theta / (2.0 * theta.sin()))
}

/// Relative motion from pose `a` to pose `b`.
///
/// The composed transform is re-orthogonalized before the logarithm, since
/// chained products drift away from SO(3).
pub fn relative_pose(a: &DMat4, b: &DMat4) -> Result<RelativePose, PoseError> {
    let relative = reorthogonalize_transform(&compose(a, b)?)?;
    Ok(RelativePose {
        translation: translation(&relative),
        rotation: log_rotation(&rotation(&relative)),
    })
}

fn max_abs_difference(a: &DMat3, b: &DMat3) -> f64 {
    let a = a.to_cols_array();
    let b = b.to_cols_array();
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
