//! SVG path mini-language: tokenizes a `d_attribute` into absolute integer
//! points. Grammar (spec section 4.1):
//!
//!   M <n> <n> ( (m|l) <n> <n> | L <n> <n> | (h|H) <n> | (v|V) <n> | (z|Z) )*
//!
//! tokens are whitespace-separated; integers may be negative; length <= 128.

use crate::error::BlockArtError;

pub const MAX_SVG_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Point { x, y }
    }
}

fn parse_int(tok: &str) -> Option<i64> {
    tok.parse::<i64>().ok()
}

/// Parses a `d_attribute` string into its sequence of absolute integer points.
/// Rejects anything that does not match the grammar.
pub fn parse_path(d_attribute: &str) -> Result<Vec<Point>, BlockArtError> {
    if d_attribute.len() > MAX_SVG_LEN {
        return Err(BlockArtError::ShapeSvgTooLong(d_attribute.to_string()));
    }

    let tokens: Vec<&str> = d_attribute.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(BlockArtError::InvalidShape(d_attribute.to_string()));
    }

    let invalid = || BlockArtError::InvalidShape(d_attribute.to_string());

    let mut points: Vec<Point> = Vec::new();
    let mut i = 0usize;

    if tokens[i] != "M" {
        return Err(invalid());
    }
    i += 1;
    let (x0, y0) = take_pair(&tokens, &mut i).ok_or_else(invalid)?;
    points.push(Point::new(x0, y0));

    while i < tokens.len() {
        match tokens[i] {
            "m" | "l" => {
                // Both lowercase moveto and lineto are relative; only the
                // uppercase forms are absolute (unlike h/v, there is no
                // absolute lowercase "l").
                let relative = true;
                i += 1;
                let (dx, dy) = take_pair(&tokens, &mut i).ok_or_else(invalid)?;
                let last = *points.last().unwrap();
                if relative {
                    points.push(Point::new(last.x + dx, last.y + dy));
                } else {
                    points.push(Point::new(dx, dy));
                }
            }
            "L" => {
                i += 1;
                let (x, y) = take_pair(&tokens, &mut i).ok_or_else(invalid)?;
                points.push(Point::new(x, y));
            }
            "h" | "H" => {
                let relative = tokens[i] == "h";
                i += 1;
                let dx = take_one(&tokens, &mut i).ok_or_else(invalid)?;
                let last = *points.last().unwrap();
                let x = if relative { last.x + dx } else { dx };
                points.push(Point::new(x, last.y));
            }
            "v" | "V" => {
                let relative = tokens[i] == "v";
                i += 1;
                let dy = take_one(&tokens, &mut i).ok_or_else(invalid)?;
                let last = *points.last().unwrap();
                let y = if relative { last.y + dy } else { dy };
                points.push(Point::new(last.x, y));
            }
            "z" | "Z" => {
                i += 1;
                points.push(points[0]);
            }
            _ => return Err(invalid()),
        }
    }

    Ok(points)
}

fn take_pair(tokens: &[&str], i: &mut usize) -> Option<(i64, i64)> {
    let x = parse_int(tokens.get(*i)?)?;
    *i += 1;
    let y = parse_int(tokens.get(*i)?)?;
    *i += 1;
    Some((x, y))
}

fn take_one(tokens: &[&str], i: &mut usize) -> Option<i64> {
    let v = parse_int(tokens.get(*i)?)?;
    *i += 1;
    Some(v)
}

/// A path is a *line* iff its first and last emitted points differ; otherwise
/// it is a closed polygon.
pub fn is_line(points: &[Point]) -> bool {
    match (points.first(), points.last()) {
        (Some(a), Some(b)) => a != b,
        _ => true,
    }
}

/// Every emitted point must satisfy 0 <= x <= x_max and 0 <= y <= y_max.
pub fn in_bounds(points: &[Point], x_max: u32, y_max: u32) -> bool {
    points
        .iter()
        .all(|p| p.x >= 0 && p.y >= 0 && (p.x as u64) <= x_max as u64 && (p.y as u64) <= y_max as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_line() {
        let pts = parse_path("M 0 0 L 3 4").unwrap();
        assert_eq!(pts, vec![Point::new(0, 0), Point::new(3, 4)]);
        assert!(is_line(&pts));
    }

    #[test]
    fn test_closed_square_relative() {
        let pts = parse_path("M 0 0 h 20 v 20 h -20 z").unwrap();
        assert_eq!(pts.first(), pts.last());
        assert!(!is_line(&pts));
    }

    #[test]
    fn test_absolute_commands() {
        let pts = parse_path("M 0 0 H 50 V 40 h -20 Z").unwrap();
        assert_eq!(
            pts,
            vec![
                Point::new(0, 0),
                Point::new(50, 0),
                Point::new(50, 40),
                Point::new(30, 40),
                Point::new(0, 0),
            ]
        );
    }

    #[test]
    fn test_negative_coordinates() {
        let pts = parse_path("M 250 350 l 100 -200 l 100 200 l -200 -150 h 200 z").unwrap();
        assert_eq!(pts[0], Point::new(250, 350));
        assert_eq!(pts.last(), Some(&pts[0]));
    }

    #[test]
    fn test_missing_leading_m_rejected() {
        assert!(parse_path("L 0 0").is_err());
    }

    #[test]
    fn test_garbage_command_rejected() {
        assert!(parse_path("M 0 0 Q 1 1").is_err());
    }

    #[test]
    fn test_too_long_rejected() {
        let long = format!("M 0 0 {}", "l 1 1 ".repeat(30));
        assert!(long.len() > MAX_SVG_LEN);
        assert!(matches!(
            parse_path(&long),
            Err(BlockArtError::ShapeSvgTooLong(_))
        ));
    }

    #[test]
    fn test_bounds_check() {
        let pts = parse_path("M 5 6").unwrap();
        assert!(!in_bounds(&pts, 5, 5));
        assert!(in_bounds(&pts, 5, 6));
    }

    #[test]
    fn test_whitespace_normalization_idempotent() {
        let a = parse_path("M 0 0   L   3   4").unwrap();
        let b = parse_path("M 0 0 L 3 4").unwrap();
        assert_eq!(a, b);
    }
}
