// src/polyfit.rs
//
// Least-squares quadratic fit x = a·y² + b·y + c.
//
// y is the independent variable so near-vertical lane lines stay well
// conditioned. Inputs are rescaled to |y| <= 1 before building the normal
// equations; coefficients are mapped back to the caller's units afterwards.
// When the points do not span enough distinct rows for a quadratic, the fit
// degrades to a line and then to a constant.

use crate::types::LaneFit;

const SINGULAR_EPS: f64 = 1e-12;

/// Fit x(y) to paired samples. Returns None only when there are no samples.
pub fn fit_quadratic(ys: &[f64], xs: &[f64]) -> Option<LaneFit> {
    let n = ys.len().min(xs.len());
    if n == 0 {
        return None;
    }
    let ys = &ys[..n];
    let xs = &xs[..n];

    let y_scale = ys.iter().fold(0.0f64, |m, y| m.max(y.abs()));
    let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

    let mut s1 = 0.0f64;
    let mut s2 = 0.0f64;
    let mut s3 = 0.0f64;
    let mut s4 = 0.0f64;
    let mut sx0 = 0.0f64;
    let mut sx1 = 0.0f64;
    let mut sx2 = 0.0f64;

    for (&y, &x) in ys.iter().zip(xs) {
        let yn = y / y_scale;
        let yn2 = yn * yn;
        s1 += yn;
        s2 += yn2;
        s3 += yn2 * yn;
        s4 += yn2 * yn2;
        sx0 += x;
        sx1 += x * yn;
        sx2 += x * yn2;
    }
    let s0 = n as f64;

    //   | s4 s3 s2 | | a |   | sx2 |
    //   | s3 s2 s1 | | b | = | sx1 |
    //   | s2 s1 s0 | | c |   | sx0 |
    if let Some((a, b, c)) = solve_3x3([s4, s3, s2, s3, s2, s1, s2, s1, s0], [sx2, sx1, sx0]) {
        return Some(LaneFit::new(a / (y_scale * y_scale), b / y_scale, c));
    }

    // Fewer than three distinct rows: fall back to a line.
    let det = s2 * s0 - s1 * s1;
    if det.abs() > SINGULAR_EPS * s0 * s0.max(1.0) {
        let b = (sx1 * s0 - sx0 * s1) / det;
        let c = (s2 * sx0 - s1 * sx1) / det;
        if b.is_finite() && c.is_finite() {
            return Some(LaneFit::new(0.0, b / y_scale, c));
        }
    }

    Some(LaneFit::new(0.0, 0.0, sx0 / s0))
}

/// Solve a 3×3 linear system Ax = b using Gaussian elimination with partial pivoting.
/// Matrix is row-major: [a00, a01, a02, a10, a11, a12, a20, a21, a22].
/// Returns None if the system is singular.
fn solve_3x3(mat: [f64; 9], rhs: [f64; 3]) -> Option<(f64, f64, f64)> {
    let mut m = [
        [mat[0], mat[1], mat[2], rhs[0]],
        [mat[3], mat[4], mat[5], rhs[1]],
        [mat[6], mat[7], mat[8], rhs[2]],
    ];
    let scale = mat.iter().fold(0.0f64, |acc, v| acc.max(v.abs())).max(1.0);

    for col in 0..3 {
        let mut max_row = col;
        for row in (col + 1)..3 {
            if m[row][col].abs() > m[max_row][col].abs() {
                max_row = row;
            }
        }
        if m[max_row][col].abs() < SINGULAR_EPS * scale {
            return None;
        }
        if max_row != col {
            m.swap(col, max_row);
        }
        for row in (col + 1)..3 {
            let factor = m[row][col] / m[col][col];
            for j in col..4 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let c = m[2][3] / m[2][2];
    let b = (m[1][3] - m[1][2] * c) / m[1][1];
    let a = (m[0][3] - m[0][2] * c - m[0][1] * b) / m[0][0];

    if a.is_finite() && b.is_finite() && c.is_finite() {
        Some((a, b, c))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_3x3_identity() {
        let (a, b, c) = solve_3x3(
            [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            [1.0, 2.0, 3.0],
        )
        .unwrap();
        assert!((a - 1.0).abs() < 1e-10);
        assert!((b - 2.0).abs() < 1e-10);
        assert!((c - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_solve_3x3_singular() {
        let result = solve_3x3(
            [1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            [1.0, 1.0, 2.0],
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_fit_vertical_line() {
        let ys: Vec<f64> = (0..300).map(|y| y as f64).collect();
        let xs = vec![200.0; ys.len()];
        let fit = fit_quadratic(&ys, &xs).unwrap();
        assert!(fit.a.abs() < 1e-9, "a should vanish, got {}", fit.a);
        assert!(fit.b.abs() < 1e-6, "b should vanish, got {}", fit.b);
        assert!((fit.c - 200.0).abs() < 1e-6, "c should be 200, got {}", fit.c);
    }

    #[test]
    fn test_fit_recovers_parabola_in_pixel_units() {
        let truth = LaneFit::new(2e-4, -0.3, 450.0);
        let ys: Vec<f64> = (0..720).step_by(3).map(|y| y as f64).collect();
        let xs = truth.sample(&ys);
        let fit = fit_quadratic(&ys, &xs).unwrap();
        assert!((fit.a - truth.a).abs() < 1e-9);
        assert!((fit.b - truth.b).abs() < 1e-6);
        assert!((fit.c - truth.c).abs() < 1e-4);
    }

    #[test]
    fn test_single_row_falls_back_to_mean() {
        let ys = vec![10.0, 10.0, 10.0];
        let xs = vec![99.0, 100.0, 101.0];
        let fit = fit_quadratic(&ys, &xs).unwrap();
        assert_eq!(fit.a, 0.0);
        assert_eq!(fit.b, 0.0);
        assert!((fit.c - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_two_rows_fit_a_line() {
        let ys = vec![0.0, 0.0, 10.0, 10.0];
        let xs = vec![5.0, 5.0, 25.0, 25.0];
        let fit = fit_quadratic(&ys, &xs).unwrap();
        assert_eq!(fit.a, 0.0);
        assert!((fit.b - 2.0).abs() < 1e-9);
        assert!((fit.c - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        assert!(fit_quadratic(&[], &[]).is_none());
    }
}
