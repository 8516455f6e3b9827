//! Ink cost formulas (spec section 4.1).

use super::path::Point;
use crate::error::BlockArtError;

const TRANSPARENT: &str = "transparent";

fn perimeter(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for w in points.windows(2) {
        let dx = (w[1].x - w[0].x) as f64;
        let dy = (w[1].y - w[0].y) as f64;
        total += (dx * dx + dy * dy).sqrt();
    }
    total
}

fn shoelace_area(points: &[Point]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let n = points.len();
    let mut acc = 0.0f64;
    let mut j = n - 1;
    for i in 0..n {
        acc += ((points[j].x + points[i].x) * (points[j].y - points[i].y)) as f64;
        j = i;
    }
    acc
}

/// Ink cost of a path given its fill/stroke tokens. `points` is the output of
/// `parse_path`. Both transparent is an error (the caller should have already
/// rejected it via `IsValidSvgShape`-equivalent checks, but this stays strict).
pub fn ink_cost(points: &[Point], fill: &str, stroke: &str) -> Result<u32, BlockArtError> {
    let stroked = stroke != TRANSPARENT;
    let filled = fill != TRANSPARENT;

    match (stroked, filled) {
        (false, false) => Err(BlockArtError::InvalidShape(
            "both fill and stroke are transparent".to_string(),
        )),
        (true, false) => {
            if points.is_empty() {
                Ok(0)
            } else if points.len() == 1 {
                Ok(1)
            } else {
                Ok(perimeter(points).ceil() as u32)
            }
        }
        (false, true) => Ok((shoelace_area(points).abs() / 2.0).ceil() as u32),
        (true, true) => {
            let perim = if points.is_empty() {
                0
            } else if points.len() == 1 {
                1
            } else {
                perimeter(points) as u32
            };
            let area = (shoelace_area(points).abs() / 2.0).ceil() as u32;
            Ok(perim + area)
        }
    }
}
