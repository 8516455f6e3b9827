//! Shape geometry: SVG path parsing, ink-cost accounting, collision detection.

pub mod collision;
pub mod ink;
pub mod path;

pub use collision::{overlaps, self_intersects};
pub use ink::ink_cost;
pub use path::{in_bounds, is_line, parse_path, Point, MAX_SVG_LEN};
