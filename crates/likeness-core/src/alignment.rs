//! Landmark-based face alignment.
//!
//! Estimates a 4-DOF similarity transform (scale, rotation, translation)
//! from detected landmarks to fixed reference positions via least-squares,
//! then warps the face into the embedding network's 96×96 input canvas.

use image::RgbImage;

use crate::types::BoundingBox;

/// Edge length of the aligned output canvas.
pub const ALIGNED_SIZE: usize = 96;

/// Reference positions of [outer left eye, outer right eye, nose tip] on
/// the 96×96 canvas.
const REFERENCE_LANDMARKS_96: [(f32, f32); 3] = [
    (18.64, 30.24),
    (77.36, 30.24),
    (48.00, 57.12),
];

/// Align a detected face to the 96×96 embedding input canvas.
///
/// The transform is anchored on the outer-eye and nose-tip landmarks; the
/// mouth points are not used. Returns an interleaved RGB buffer of
/// `ALIGNED_SIZE * ALIGNED_SIZE * 3` bytes.
pub fn align_face(image: &RgbImage, face: &BoundingBox) -> Vec<u8> {
    let src = face.outer_eyes_and_nose();
    let matrix = estimate_similarity_transform(&src, &REFERENCE_LANDMARKS_96);
    warp_rgb(image, &matrix, ALIGNED_SIZE)
}

/// Estimate a 2×3 similarity transform mapping `src` points onto `dst`
/// points using least-squares over all pairs.
///
/// Returns [a, -b, tx, b, a, ty] representing the matrix:
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
fn estimate_similarity_transform(src: &[(f32, f32)], dst: &[(f32, f32)]) -> [f32; 6] {
    debug_assert_eq!(src.len(), dst.len());

    // Normal equations for the overdetermined system. Each pair
    // (sx, sy) -> (dx, dy) contributes two rows:
    //   sx * a - sy * b + tx = dx
    //   sy * a + sx * b + ty = dy
    let mut ata = [[0.0f32; 4]; 4];
    let mut atb = [0.0f32; 4];

    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let rows = [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)];
        for (row, rhs) in rows {
            for j in 0..4 {
                for k in 0..4 {
                    ata[j][k] += row[j] * row[k];
                }
                atb[j] += row[j] * rhs;
            }
        }
    }

    let x = solve_4x4(ata, atb);
    let (a, b, tx, ty) = (x[0], x[1], x[2], x[3]);
    [a, -b, tx, b, a, ty]
}

/// Solve a 4×4 linear system via Gaussian elimination with partial
/// pivoting. A singular system yields the identity solution.
fn solve_4x4(a: [[f32; 4]; 4], b: [f32; 4]) -> [f32; 4] {
    let mut m = [[0.0f32; 5]; 4];
    for (i, row) in a.iter().enumerate() {
        m[i][..4].copy_from_slice(row);
        m[i][4] = b[i];
    }

    for col in 0..4 {
        let pivot_row = (col..4)
            .max_by(|&r1, &r2| m[r1][col].abs().total_cmp(&m[r2][col].abs()))
            .unwrap_or(col);
        m.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return [1.0, 0.0, 0.0, 0.0];
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }
    x
}

/// Apply a 2×3 similarity warp to an RGB image, producing an interleaved
/// `out_size × out_size` crop.
///
/// Samples with bilinear interpolation per channel; out-of-bounds pixels
/// are black.
fn warp_rgb(image: &RgbImage, matrix: &[f32; 6], out_size: usize) -> Vec<u8> {
    let (a, tx, b, ty) = (matrix[0], matrix[2], matrix[3], matrix[5]);
    let (src_w, src_h) = (image.width() as i32, image.height() as i32);

    // Invert the 2×2 part: M = [[a, -b], [b, a]], det = a² + b².
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return vec![0u8; out_size * out_size * 3];
    }
    let ia = a / det;
    let ib = b / det;

    let sample = |x: i32, y: i32, c: usize| -> f32 {
        if x >= 0 && x < src_w && y >= 0 && y < src_h {
            image.get_pixel(x as u32, y as u32)[c] as f32
        } else {
            0.0
        }
    };

    let mut output = vec![0u8; out_size * out_size * 3];
    for oy in 0..out_size {
        for ox in 0..out_size {
            // Map the output pixel back to source space: src = M⁻¹ (dst - t)
            let dx = ox as f32 - tx;
            let dy = oy as f32 - ty;
            let sx = ia * dx + ib * dy;
            let sy = -ib * dx + ia * dy;

            let x0 = sx.floor() as i32;
            let y0 = sy.floor() as i32;
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            let base = (oy * out_size + ox) * 3;
            for c in 0..3 {
                let val = sample(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                    + sample(x0 + 1, y0, c) * fx * (1.0 - fy)
                    + sample(x0, y0 + 1, c) * (1.0 - fx) * fy
                    + sample(x0 + 1, y0 + 1, c) * fx * fy;
                output[base + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    output
}
