//! Latitude/longitude of every grid point, for the grid types we can resolve.

use std::f64::consts::PI;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::grib::sections::sect3::{Grid, GridDefinition, GridLayout, MISSING_U32};

const NEWTON_MAX_ITERATIONS: usize = 100;
const NEWTON_TOLERANCE: f64 = 1e-15;

/// `(lats, lons)` in degrees, both shaped like the message values `(Nj, Ni)`.
///
/// Only `regular_ll` and `regular_gg` are supported; anything else fails with
/// [`Error::UnsupportedGridType`].
pub fn latlons(grid_definition: &GridDefinition) -> Result<(Field, Field)> {
    let type_of_grid = grid_definition.type_of_grid();

    let (layout, lats) = match &grid_definition.grid {
        Grid::Grid0(grid) if !grid.layout.is_reduced() => {
            let layout = &grid.layout;
            let d_j = if grid.d_j == MISSING_U32 {
                increment(layout.la1.into(), layout.la2.into(), layout.n_j, layout)
            } else {
                layout.to_degrees(grid.d_j.into())
            };
            let la1 = layout.to_degrees(layout.la1.into());
            let sign = if layout.j_scans_positively() { 1.0 } else { -1.0 };
            let lats = (0..layout.n_j as usize).map(|j| la1 + sign * j as f64 * d_j).collect::<Vec<_>>();
            (layout, lats)
        }
        Grid::Grid40(grid) if !grid.layout.is_reduced() => {
            let layout = &grid.layout;
            (layout, gaussian_rows(layout, grid.n as usize)?)
        }
        _ => return Err(Error::UnsupportedGridType(type_of_grid.to_string())),
    };

    let lo1 = layout.to_degrees(layout.lo1.into());
    let d_i = if layout.d_i == MISSING_U32 {
        let mut lo2 = i64::from(layout.lo2);
        if !layout.i_scans_negatively() && layout.lo2 < layout.lo1 {
            lo2 += layout.from_degrees(360.0);
        }
        increment(layout.lo1.into(), lo2, layout.n_i, layout)
    } else {
        layout.to_degrees(layout.d_i.into())
    };
    let sign = if layout.i_scans_negatively() { -1.0 } else { 1.0 };
    let lons = (0..layout.n_i as usize).map(|i| lo1 + sign * i as f64 * d_i).collect::<Vec<_>>();

    let shape = (layout.n_j as usize, layout.n_i as usize);
    debug!("Resolved {} grid of shape {:?}", type_of_grid, shape);

    Ok((
        Field::from_fn(shape, |j, _| lats[j]),
        Field::from_fn(shape, |_, i| lons[i]),
    ))
}

/// Spacing between `n` points from `first` to `last`, in degrees.
fn increment(first: i64, last: i64, n: u32, layout: &GridLayout) -> f64 {
    if n < 2 {
        return 0.0;
    }
    layout.to_degrees((last - first).abs()) / (n - 1) as f64
}

/// Rows of a Gaussian grid, starting from the latitude nearest to the first grid point.
fn gaussian_rows(layout: &GridLayout, n: usize) -> Result<Vec<f64>> {
    if n == 0 {
        return Err(Error::invalid("N", "a Gaussian grid needs at least one parallel"));
    }
    let latitudes = gaussian_latitudes(n);
    let la1 = layout.to_degrees(layout.la1.into());

    let (first, distance) = latitudes.iter()
        .map(|lat| (lat - la1).abs())
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best });
    if distance > 90.0 / (2 * n) as f64 {
        return Err(Error::invalid("latitudeOfFirstGridPointInDegrees", format!("{} is not a Gaussian latitude for N={}", la1, n)));
    }

    let n_j = layout.n_j as usize;
    let rows: Option<Vec<f64>> = if layout.j_scans_positively() {
        // latitudes run north to south
        (0..n_j).map(|j| first.checked_sub(j).map(|k| latitudes[k])).collect()
    } else {
        (0..n_j).map(|j| latitudes.get(first + j).copied()).collect()
    };
    rows.ok_or_else(|| Error::invalid("Nj", format!("{} rows do not fit the {} Gaussian latitudes", n_j, 2 * n)))
}

/// The `2n` Gaussian latitudes in degrees, north to south: the zeros of the Legendre
/// polynomial of degree `2n`, found by Newton iteration.
pub fn gaussian_latitudes(n: usize) -> Vec<f64> {
    let num_lats = 2 * n;
    let mut latitudes = vec![0.0; num_lats];

    for i in 0..n {
        let mut z = (PI * (i as f64 + 0.75) / (num_lats as f64 + 0.5)).cos();
        for _ in 0..NEWTON_MAX_ITERATIONS {
            let (p, dp) = legendre(num_lats, z);
            let previous = z;
            z -= p / dp;
            if (z - previous).abs() < NEWTON_TOLERANCE {
                break;
            }
        }
        let lat = z.asin().to_degrees();
        latitudes[i] = lat;
        latitudes[num_lats - 1 - i] = -lat;
    }

    latitudes
}

/// `P_n(z)` and its derivative.
fn legendre(n: usize, z: f64) -> (f64, f64) {
    let (mut p0, mut p1) = (1.0, z);
    for k in 2..=n {
        let k = k as f64;
        let p2 = ((2.0 * k - 1.0) * z * p1 - (k - 1.0) * p0) / k;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (z * p1 - p0) / (z * z - 1.0);
    (p1, dp)
}
