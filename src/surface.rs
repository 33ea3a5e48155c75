//! Bed surface model built from a probe grid.
//!
//! The model triangulates the sampled deviations and evaluates them as a
//! piecewise-linear surface; queries outside the convex hull yield NaN.
//! From that surface it derives the tilt and bowl metrics the full-bed
//! estimator consumes. An optional densified mode fills a finer grid with
//! interpolated points and blended corner/tower/center values before any
//! metric is read, which smooths single-sample noise at the anchors.

use crate::grid::ProbeGrid;
use crate::stats::{mean, median};

/// Spacing between probed rows and columns.
const PROBE_SPACING: f64 = 25.0;

/// Densified cells per probe spacing.
const SUBDIVISIONS: usize = 3;

/// Tolerance for on-edge hull queries; barycentric weights this far
/// negative still count as inside.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Margin for the in-circumcircle test. Cocircular points (every grid
/// square) must land on the "outside" side deterministically.
const INCIRCLE_MARGIN: f64 = 1e-6;

/// How the surface between probe points is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpMethod {
    /// Triangulate the measured points only.
    #[default]
    Plain,
    /// Add subdivided grid points and blended corner/tower/center values
    /// to the triangulation before reading metrics.
    Densified,
}

impl InterpMethod {
    /// Method encoded as the numeric flag the settings file uses.
    pub fn from_flag(flag: u8) -> Self {
        if flag == 1 {
            Self::Densified
        } else {
            Self::Plain
        }
    }

    /// Numeric flag for the settings file.
    pub fn flag(self) -> u8 {
        match self {
            Self::Plain => 0,
            Self::Densified => 1,
        }
    }
}

/// Which tower sits opposite the LCD on the assembled machine.
///
/// Firmware builds rotate the logical towers; the geographic tilt anchors
/// get mapped onto X/Y/Z accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TowerLayout {
    /// X tower opposite the LCD (stock and older Marlin builds).
    #[default]
    XOpposite,
    /// Y tower opposite the LCD (Marlin 1.3.3 builds).
    YOpposite,
    /// Z tower opposite the LCD.
    ZOpposite,
}

impl TowerLayout {
    /// Layout encoded as the numeric flag the settings file uses.
    pub fn from_flag(flag: u8) -> Self {
        match flag {
            1 => Self::YOpposite,
            2 => Self::ZOpposite,
            _ => Self::XOpposite,
        }
    }

    /// Numeric flag for the settings file.
    pub fn flag(self) -> u8 {
        match self {
            Self::XOpposite => 0,
            Self::YOpposite => 1,
            Self::ZOpposite => 2,
        }
    }
}

/// Tilt and bowl statistics mapped onto the machine's tower axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMetrics {
    /// Local tilt average at the X-tower anchor.
    pub tilt_x: f64,
    /// Local tilt average at the Y-tower anchor.
    pub tilt_y: f64,
    /// Local tilt average at the Z-tower anchor.
    pub tilt_z: f64,
    /// Single-point surface height at the X-tower anchor.
    pub height_x: f64,
    /// Single-point surface height at the Y-tower anchor.
    pub height_y: f64,
    /// Single-point surface height at the Z-tower anchor.
    pub height_z: f64,
    /// Mean deviation over the 3x3 patch at the bed center.
    pub bowl_center: f64,
    /// Median deviation around the perimeter ring.
    pub bowl_outer: f64,
}

/// Piecewise-linear interpolator over scattered points.
#[derive(Debug, Clone)]
pub struct Interpolant {
    points: Vec<(f64, f64)>,
    values: Vec<f64>,
    triangles: Vec<[usize; 3]>,
}

impl Interpolant {
    /// Triangulate `points` with their `values`. Both slices must have the
    /// same length; fewer than three points leaves the domain empty.
    pub fn new(points: Vec<(f64, f64)>, values: Vec<f64>) -> Self {
        debug_assert_eq!(points.len(), values.len());
        let triangles = triangulate(&points);
        Self {
            points,
            values,
            triangles,
        }
    }

    /// Surface value at `(x, y)`, NaN outside the convex hull.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        for tri in &self.triangles {
            let a = self.points[tri[0]];
            let b = self.points[tri[1]];
            let c = self.points[tri[2]];
            let area = cross(a, b, c);
            if area.abs() < f64::EPSILON {
                continue;
            }
            let wa = cross((x, y), b, c) / area;
            let wb = cross(a, (x, y), c) / area;
            let wc = cross(a, b, (x, y)) / area;
            if wa >= -EDGE_TOLERANCE && wb >= -EDGE_TOLERANCE && wc >= -EDGE_TOLERANCE {
                return wa * self.values[tri[0]]
                    + wb * self.values[tri[1]]
                    + wc * self.values[tri[2]];
            }
        }
        f64::NAN
    }
}

/// Twice the signed area of triangle `(a, b, c)`; positive when
/// counter-clockwise.
fn cross(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// True when `p` lies strictly inside the circumcircle of the
/// counter-clockwise triangle `(a, b, c)`.
fn in_circumcircle(p: (f64, f64), a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> bool {
    let (adx, ady) = (a.0 - p.0, a.1 - p.1);
    let (bdx, bdy) = (b.0 - p.0, b.1 - p.1);
    let (cdx, cdy) = (c.0 - p.0, c.1 - p.1);
    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;
    let det = ad * (bdx * cdy - bdy * cdx) - bd * (adx * cdy - ady * cdx)
        + cd * (adx * bdy - ady * bdx);
    det > INCIRCLE_MARGIN
}

/// Orient a triangle counter-clockwise.
fn oriented(mut tri: [usize; 3], verts: &[(f64, f64)]) -> [usize; 3] {
    if cross(verts[tri[0]], verts[tri[1]], verts[tri[2]]) < 0.0 {
        tri.swap(1, 2);
    }
    tri
}

/// Incremental Bowyer-Watson Delaunay triangulation. Returns triangles as
/// index triples into `points`, all counter-clockwise.
fn triangulate(points: &[(f64, f64)]) -> Vec<[usize; 3]> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let (cx, cy) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);

    // Super-triangle comfortably enclosing every point.
    let mut verts: Vec<(f64, f64)> = points.to_vec();
    verts.push((cx - 20.0 * span, cy - span));
    verts.push((cx + 20.0 * span, cy - span));
    verts.push((cx, cy + 20.0 * span));
    let mut triangles: Vec<[usize; 3]> = vec![[n, n + 1, n + 2]];

    for i in 0..n {
        let p = verts[i];
        let bad: Vec<usize> = triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| in_circumcircle(p, verts[t[0]], verts[t[1]], verts[t[2]]))
            .map(|(idx, _)| idx)
            .collect();

        // Cavity boundary: edges owned by exactly one bad triangle.
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for &t_idx in &bad {
            let t = triangles[t_idx];
            for edge in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                let shared = bad.iter().any(|&o| {
                    o != t_idx && triangles[o].contains(&edge.0) && triangles[o].contains(&edge.1)
                });
                if !shared {
                    boundary.push(edge);
                }
            }
        }

        for &t_idx in bad.iter().rev() {
            triangles.swap_remove(t_idx);
        }
        for (a, b) in boundary {
            triangles.push(oriented([a, b, i], &verts));
        }
    }

    triangles.retain(|t| t.iter().all(|&v| v < n));
    triangles
}

/// Value one third of the way from `from` toward `toward`.
fn third(from: f64, toward: f64) -> f64 {
    (toward - from) / 3.0 + from
}

/// Value halfway from `from` toward `toward`.
fn half(from: f64, toward: f64) -> f64 {
    (toward - from) / 2.0 + from
}

/// Linear interpolation through `(p0, v0)` and `(p1, v1)` evaluated at `p`.
fn lerp(p0: f64, v0: f64, p1: f64, v1: f64, p: f64) -> f64 {
    v0 + (p - p0) * (v1 - v0) / (p1 - p0)
}

/// Deviation surface over the probed bed with its metric queries.
#[derive(Debug, Clone)]
pub struct SurfaceModel {
    interp: Interpolant,
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
    dx: f64,
    dy: f64,
}

impl SurfaceModel {
    /// Build the deviation surface for one probe pass.
    pub fn build(grid: &ProbeGrid, method: InterpMethod) -> Self {
        let mut points: Vec<(f64, f64)> = grid.samples().iter().map(|s| (s.x, s.y)).collect();
        let mut values = grid.deviations();

        let xmin = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let xmax = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let ymin = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let ymax = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        let step = PROBE_SPACING / SUBDIVISIONS as f64;

        let interp = match method {
            InterpMethod::Plain => Interpolant::new(points, values),
            InterpMethod::Densified => {
                let base = Interpolant::new(points.clone(), values.clone());
                subdivide_grid(&base, &mut points, &mut values, xmin, xmax, ymin, ymax, step);
                blend_corners(&base, &mut points, &mut values, step);
                let with_corners = Interpolant::new(points.clone(), values.clone());
                blend_towers_and_center(&with_corners, &mut points, &mut values, step);
                Interpolant::new(points, values)
            }
        };

        Self {
            interp,
            xmin,
            xmax,
            ymin,
            ymax,
            dx: step,
            dy: step,
        }
    }

    /// Surface value at `(x, y)`, NaN outside the probed hull.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        self.interp.sample(x, y)
    }

    /// Read every tilt and bowl metric, mapped through `towers`.
    ///
    /// The north anchor sits opposite the LCD, west to its left, east to
    /// its right; `towers` assigns those anchors to the X/Y/Z axes.
    pub fn metrics(&self, towers: TowerLayout) -> SurfaceMetrics {
        let (dx, dy) = (self.dx, self.dy);

        let (nx, ny) = (self.xmin, self.ymin / 2.0);
        let north_height = self.sample(nx, ny);
        let north = mean(&[
            self.sample(nx, ny),
            self.sample(nx, ny + dy),
            self.sample(nx + dx, ny),
            self.sample(nx + dx, ny + dy),
            self.sample(nx + dx, ny - dy),
        ]);

        let (wx, wy) = (self.xmax, self.ymin / 2.0);
        let west_height = self.sample(wx, wy);
        let west = mean(&[
            self.sample(wx, wy),
            self.sample(wx, wy + dy),
            self.sample(wx - dx, wy),
            self.sample(wx - dx, wy + dy),
            self.sample(wx - dx, wy - dy),
        ]);

        let (ex, ey) = (0.0, self.ymax);
        let east_height = self.sample(ex, ey);
        let east = mean(&[
            self.sample(ex - dx, ey),
            self.sample(ex, ey),
            self.sample(ex + dx, ey),
            self.sample(ex - dx, ey - dy),
            self.sample(ex, ey - dy),
            self.sample(ex + dx, ey - dy),
        ]);

        let mut center_patch = Vec::with_capacity(9);
        for oy in [dy, 0.0, -dy] {
            for ox in [-dx, 0.0, dx] {
                center_patch.push(self.sample(ox, oy));
            }
        }
        let bowl_center = mean(&center_patch);

        let ring = [
            self.sample(self.xmin, self.ymin / 2.0),
            self.sample(self.xmin, 0.0),
            self.sample(self.xmin, self.ymax / 2.0),
            self.sample(self.xmax, self.ymin / 2.0),
            self.sample(self.xmax, 0.0),
            self.sample(self.xmax, self.ymax / 2.0),
            self.sample(self.xmin / 2.0, self.ymax),
            self.sample(0.0, self.ymax),
            self.sample(self.xmax / 2.0, self.ymax),
            self.sample(self.xmin / 2.0, self.ymin),
            self.sample(0.0, self.ymin),
            self.sample(self.xmax / 2.0, self.ymin),
        ];
        let bowl_outer = median(&ring);

        let (tilt_x, height_x, tilt_y, height_y, tilt_z, height_z) = match towers {
            TowerLayout::XOpposite => {
                (north, north_height, west, west_height, east, east_height)
            }
            TowerLayout::YOpposite => {
                (east, east_height, north, north_height, west, west_height)
            }
            TowerLayout::ZOpposite => {
                (west, west_height, east, east_height, north, north_height)
            }
        };

        SurfaceMetrics {
            tilt_x,
            tilt_y,
            tilt_z,
            height_x,
            height_y,
            height_z,
            bowl_center,
            bowl_outer,
        }
    }
}

/// Fill the finer grid along every probed row and column by interpolating
/// between the flanking measured values. The circular bed clips the first
/// and last rows/columns to their measured span.
#[allow(clippy::too_many_arguments)]
fn subdivide_grid(
    base: &Interpolant,
    points: &mut Vec<(f64, f64)>,
    values: &mut Vec<f64>,
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
    step: f64,
) {
    let nmax = ((ymax - ymin) / step).round() as usize;
    let rows = ((ymax - ymin) / PROBE_SPACING).round() as usize;
    let cols = ((xmax - xmin) / PROBE_SPACING).round() as usize;

    for iy in 0..rows {
        let y = ymin + iy as f64 * PROBE_SPACING;
        let (i_start, i_end) = if y == ymin || y == ymax {
            (SUBDIVISIONS, nmax - SUBDIVISIONS)
        } else {
            (0, nmax - 1)
        };
        let (mut x0, mut x1, mut z0, mut z1) = (0.0, 0.0, 0.0, 0.0);
        for ix in 0..nmax {
            if ix < i_start || ix > i_end {
                continue;
            }
            let x = xmin + ix as f64 * step;
            if ix % SUBDIVISIONS == 0 {
                x0 = if ix == i_start { x } else { x1 };
                x1 = x0 + PROBE_SPACING;
                z0 = base.sample(x0, y);
                z1 = base.sample(x1, y);
            } else {
                points.push((x, y));
                values.push(lerp(x0, z0, x1, z1, x));
            }
        }
    }

    for ix in 0..cols {
        let x = xmin + ix as f64 * PROBE_SPACING;
        let (i_start, i_end) = if x == xmin || x == xmax {
            (SUBDIVISIONS, nmax - SUBDIVISIONS)
        } else {
            (0, nmax - 1)
        };
        let (mut y0, mut y1, mut z0, mut z1) = (0.0, 0.0, 0.0, 0.0);
        for iy in 0..nmax {
            if iy < i_start || iy > i_end {
                continue;
            }
            let y = ymin + iy as f64 * step;
            if iy % SUBDIVISIONS == 0 {
                y0 = if iy == i_start { y } else { y1 };
                y1 = y0 + PROBE_SPACING;
                z0 = base.sample(x, y0);
                z1 = base.sample(x, y1);
            } else {
                points.push((x, y));
                values.push(lerp(y0, z0, y1, z1, y));
            }
        }
    }
}

/// Add two blended points on the diagonal of each clipped corner, spaced
/// a third of the way from each flanking edge node.
fn blend_corners(
    base: &Interpolant,
    points: &mut Vec<(f64, f64)>,
    values: &mut Vec<f64>,
    step: f64,
) {
    let mut push = |x: f64, y: f64, v: f64| {
        points.push((x, y));
        values.push(v);
    };

    // Top left
    let a = base.sample(-50.0, 25.0);
    let b = base.sample(-25.0, 50.0);
    push(-50.0 + step, 25.0 + step, third(a, b));
    push(-50.0 + 2.0 * step, 25.0 + 2.0 * step, third(b, a));
    // Top right
    let a = base.sample(50.0, 25.0);
    let b = base.sample(25.0, 50.0);
    push(50.0 - step, 25.0 + step, third(a, b));
    push(50.0 - 2.0 * step, 25.0 + 2.0 * step, third(b, a));
    // Bottom right
    let a = base.sample(50.0, -25.0);
    let b = base.sample(25.0, -50.0);
    push(50.0 - step, -25.0 - step, third(a, b));
    push(50.0 - 2.0 * step, -25.0 - 2.0 * step, third(b, a));
    // Bottom left
    let a = base.sample(-50.0, -25.0);
    let b = base.sample(-25.0, -50.0);
    push(-50.0 + step, -25.0 - step, third(a, b));
    push(-50.0 + 2.0 * step, -25.0 - 2.0 * step, third(b, a));
}

/// Complete the columns flanking each tower gap and ring the bed center
/// with blended values used by the metric patches.
fn blend_towers_and_center(
    interp: &Interpolant,
    points: &mut Vec<(f64, f64)>,
    values: &mut Vec<f64>,
    step: f64,
) {
    let mut push = |x: f64, y: f64, v: f64| {
        points.push((x, y));
        values.push(v);
    };

    // One point each beside the north and west tower gaps.
    for col in [-50.0 + step, 50.0 - step] {
        let at_zero = interp.sample(col, 0.0);
        let at_edge = interp.sample(col, -25.0);
        push(col, -25.0 + step, third(at_edge, at_zero));
    }

    // Two points below the east tower gap.
    for col in [-step, step] {
        let at_top = interp.sample(col, 50.0);
        let at_mid = interp.sample(col, 25.0);
        push(col, 50.0 - step, third(at_top, at_mid));
    }

    // Four points around the center patch.
    let left_mid = interp.sample(-step, 25.0);
    let right_mid = interp.sample(step, 25.0);
    let left_zero = interp.sample(-step, 0.0);
    let right_zero = interp.sample(step, 0.0);
    let left_low = interp.sample(-step, -25.0);
    let right_low = interp.sample(step, -25.0);
    let left_upper = third(left_mid, left_zero);
    let right_upper = third(right_mid, right_zero);
    push(-step, step, half(left_zero, left_upper));
    push(step, step, half(right_zero, right_upper));
    push(-step, -step, third(left_zero, left_low));
    push(step, -step, third(right_zero, right_low));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{ProbeGrid, Sample, FULL_BED};

    fn plane_grid(f: impl Fn(f64, f64) -> f64) -> ProbeGrid {
        let samples = FULL_BED
            .points
            .iter()
            .map(|&(x, y)| Sample {
                x,
                y,
                z1: f(x, y),
                z2: f(x, y),
            })
            .collect();
        ProbeGrid::from_samples(samples)
    }

    #[test]
    fn test_interpolant_exact_at_vertices() {
        let points: Vec<(f64, f64)> = FULL_BED.points.to_vec();
        let values: Vec<f64> = points.iter().map(|&(x, y)| 0.001 * x - 0.002 * y).collect();
        let interp = Interpolant::new(points.clone(), values.clone());
        for (&(x, y), &v) in points.iter().zip(&values) {
            assert!((interp.sample(x, y) - v).abs() < 1e-9, "vertex ({x}, {y})");
        }
    }

    #[test]
    fn test_interpolant_linear_precision() {
        let points: Vec<(f64, f64)> = FULL_BED.points.to_vec();
        let plane = |x: f64, y: f64| 0.5 + 0.004 * x - 0.003 * y;
        let values: Vec<f64> = points.iter().map(|&(x, y)| plane(x, y)).collect();
        let interp = Interpolant::new(points, values);

        for &(x, y) in &[(0.0, 0.0), (-12.5, 7.5), (30.0, -10.0), (-8.0, 44.0)] {
            assert!(
                (interp.sample(x, y) - plane(x, y)).abs() < 1e-9,
                "query ({x}, {y})"
            );
        }
    }

    #[test]
    fn test_interpolant_nan_outside_hull() {
        let points: Vec<(f64, f64)> = FULL_BED.points.to_vec();
        let values = vec![0.0; points.len()];
        let interp = Interpolant::new(points, values);

        assert!(interp.sample(60.0, 60.0).is_nan());
        // The corners of the bounding square are clipped off the bed.
        assert!(interp.sample(50.0, -50.0).is_nan());
    }

    #[test]
    fn test_interpolant_on_hull_edge() {
        let points: Vec<(f64, f64)> = FULL_BED.points.to_vec();
        let values: Vec<f64> = points.iter().map(|&(x, _)| 0.01 * x).collect();
        let interp = Interpolant::new(points, values);

        // Between (-25, 50) and (0, 50) on the hull boundary.
        let v = interp.sample(-25.0 / 3.0, 50.0);
        assert!((v - 0.01 * (-25.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_densified_plane_matches_plain() {
        // Every densified point is an affine blend, so a plane survives
        // the augmentation and both modes must read the same metrics.
        let grid = plane_grid(|x, y| 10.0 + 0.004 * x - 0.002 * y);
        let plain = SurfaceModel::build(&grid, InterpMethod::Plain).metrics(TowerLayout::XOpposite);
        let dense =
            SurfaceModel::build(&grid, InterpMethod::Densified).metrics(TowerLayout::XOpposite);

        for (p, d) in [
            (plain.tilt_x, dense.tilt_x),
            (plain.tilt_y, dense.tilt_y),
            (plain.tilt_z, dense.tilt_z),
            (plain.height_x, dense.height_x),
            (plain.height_y, dense.height_y),
            (plain.height_z, dense.height_z),
            (plain.bowl_center, dense.bowl_center),
            (plain.bowl_outer, dense.bowl_outer),
        ] {
            assert!((p - d).abs() < 1e-6, "{p} vs {d}");
        }
    }

    #[test]
    fn test_tilt_anchors_on_plane() {
        // Grid heights 0.01*x; deviations subtract the median, which
        // cancels in every tilt difference.
        let grid = plane_grid(|x, _| 10.0 + 0.01 * x);
        let model = SurfaceModel::build(&grid, InterpMethod::Plain);
        let m = model.metrics(TowerLayout::XOpposite);

        // North anchor at x=-50, west at x=50, east at x=0.
        assert!(m.height_x < m.height_z && m.height_z < m.height_y);
        assert!((m.height_y - m.height_x - 1.0).abs() < 1e-9);
        // Tilt averages keep the same ordering on a plane.
        assert!(m.tilt_x < m.tilt_z && m.tilt_z < m.tilt_y);
        // A plane has no bowl.
        assert!((m.bowl_center - m.bowl_outer).abs() < 1e-9);
    }

    #[test]
    fn test_tower_mapping_permutes_anchors() {
        let grid = plane_grid(|x, y| 10.0 + 0.01 * x + 0.003 * y);
        let model = SurfaceModel::build(&grid, InterpMethod::Plain);

        let stock = model.metrics(TowerLayout::XOpposite);
        let rotated = model.metrics(TowerLayout::YOpposite);
        let experimental = model.metrics(TowerLayout::ZOpposite);

        // flag 1 shifts east->X, north->Y, west->Z.
        assert_eq!(rotated.tilt_x, stock.tilt_z);
        assert_eq!(rotated.tilt_y, stock.tilt_x);
        assert_eq!(rotated.tilt_z, stock.tilt_y);
        // flag 2 shifts west->X, east->Y, north->Z.
        assert_eq!(experimental.tilt_x, stock.tilt_y);
        assert_eq!(experimental.tilt_y, stock.tilt_z);
        assert_eq!(experimental.tilt_z, stock.tilt_x);
        assert_eq!(experimental.height_z, stock.height_x);
    }

    #[test]
    fn test_bowl_shape_detected() {
        // A bowl: low center, high rim.
        let grid = plane_grid(|x, y| 10.0 + 0.0002 * (x * x + y * y));
        let model = SurfaceModel::build(&grid, InterpMethod::Plain);
        let m = model.metrics(TowerLayout::XOpposite);

        assert!(m.bowl_center < m.bowl_outer);
    }

    #[test]
    fn test_metrics_finite_in_both_modes() {
        // Perturbed, non-planar data still yields finite metrics even at
        // the on-hull-edge anchors.
        let grid = plane_grid(|x, y| 10.0 + 0.002 * x - 0.001 * y + 0.0001 * x * y / 10.0);
        for method in [InterpMethod::Plain, InterpMethod::Densified] {
            let m = SurfaceModel::build(&grid, method).metrics(TowerLayout::XOpposite);
            for v in [
                m.tilt_x,
                m.tilt_y,
                m.tilt_z,
                m.height_x,
                m.height_y,
                m.height_z,
                m.bowl_center,
                m.bowl_outer,
            ] {
                assert!(v.is_finite(), "{method:?} produced {v}");
            }
        }
    }
}
