//! Synthetic raster generators.
//!
//! All grids are row-major, `f64`, row 0 at the top.

/// Each cell is `col * 1000 + row`, so a value identifies its position.
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);
/// assert_eq!(grid[10], 1.0);
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f64);
        }
    }
    data
}

/// Linear ramp from 0.0 on the left edge to 1.0 on the right edge,
/// constant down each column.
pub fn create_gradient_grid(width: usize, height: usize) -> Vec<f64> {
    let denom = (width.max(2) - 1) as f64;
    (0..height)
        .flat_map(|_| (0..width).map(move |col| col as f64 / denom))
        .collect()
}

/// Elevation-like surface: a smooth hill peaking in the centre.
pub fn create_hill_grid(width: usize, height: usize, peak: f64) -> Vec<f64> {
    let cx = (width as f64 - 1.0) / 2.0;
    let cy = (height as f64 - 1.0) / 2.0;
    let r = cx.max(cy).max(1.0);
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = (col as f64 - cx) / r;
            let dy = (row as f64 - cy) / r;
            data.push(peak * (-(dx * dx + dy * dy) * 2.0).exp());
        }
    }
    data
}

/// Replace every `every`-th cell (row-major, starting at 0) with `nodata`.
pub fn with_nodata(mut data: Vec<f64>, every: usize, nodata: f64) -> Vec<f64> {
    if every > 0 {
        for value in data.iter_mut().step_by(every) {
            *value = nodata;
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_edges() {
        let g = create_gradient_grid(5, 2);
        assert_eq!(&g[..5], &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(&g[5..], &g[..5]);
    }

    #[test]
    fn test_hill_peaks_in_centre() {
        let g = create_hill_grid(5, 5, 100.0);
        let max = g.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(g[12], max);
        assert!((max - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_with_nodata() {
        let g = with_nodata(vec![1.0; 6], 3, -9999.0);
        assert_eq!(g, vec![-9999.0, 1.0, 1.0, -9999.0, 1.0, 1.0]);
    }
}
