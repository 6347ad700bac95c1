/// `n` evenly spaced points on `[start, end]`, optionally excluding `end`.
pub fn linspace(start: f64, end: f64, n: usize, endpoint: bool) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![start];
    }
    let divisions = if endpoint { n - 1 } else { n } as f64;
    let step = (end - start) / divisions;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Uniform grid over `[0, length]` with `num_points` nodes.
pub fn uniform(length: f64, num_points: usize) -> Vec<f64> {
    linspace(0.0, length, num_points, true)
}

/// One piece of a segmented grid.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub points: usize,
    pub endpoint: bool,
}

impl Segment {
    pub fn new(start: f64, end: f64, points: usize, endpoint: bool) -> Self {
        Self {
            start,
            end,
            points,
            endpoint,
        }
    }
}

/// Concatenates segments into one grid, so interfaces and contacts can be
/// resolved more finely than the bulk.
pub fn segmented(segments: &[Segment]) -> Vec<f64> {
    segments
        .iter()
        .flat_map(|s| linspace(s.start, s.end, s.points, s.endpoint))
        .collect()
}

/// Grid of `bulk_points` over `[0, length]` refined around every interface
/// position with `fine_points` within `half_width` on either side.
pub fn refined_around(
    length: f64,
    interfaces: &[f64],
    half_width: f64,
    bulk_points: usize,
    fine_points: usize,
) -> Vec<f64> {
    let mut nodes = uniform(length, bulk_points);
    for &x in interfaces {
        let lo = (x - half_width).max(0.0);
        let hi = (x + half_width).min(length);
        nodes.extend(linspace(lo, hi, fine_points, true));
    }
    nodes.sort_by(|a, b| a.total_cmp(b));
    // drop coincident nodes so the grid stays strictly increasing
    let min_gap = 1e-12 * length.abs().max(f64::MIN_POSITIVE);
    nodes.dedup_by(|b, a| (*b - *a).abs() <= min_gap);
    nodes
}
