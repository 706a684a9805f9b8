//! Frame cell → background offset.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Background offset in CSS pixels. Both components are zero or negative for
/// in-range frames, so the selected cell lands at the element origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BackgroundPosition {
    pub x: f64,
    pub y: f64,
}

impl fmt::Display for BackgroundPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px {}px", self.x, self.y)
    }
}

/// Offset exposing frame `index` of a sheet laid out row-major in `columns`
/// columns. `None` when `columns` is zero.
pub fn frame_position(
    index: u32,
    columns: u32,
    frame_width: f64,
    frame_height: f64,
) -> Option<BackgroundPosition> {
    if columns == 0 {
        return None;
    }
    let row = index / columns;
    let col = index % columns;
    // `+ 0.0` turns -0 into 0 so column/row zero prints as "0px".
    Some(BackgroundPosition {
        x: -frame_width * f64::from(col) + 0.0,
        y: -frame_height * f64::from(row) + 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_is_origin() {
        let p = frame_position(0, 4, 100.0, 50.0).unwrap();
        assert_eq!(p.x, 0.0);
        assert_eq!(p.y, 0.0);
        assert_eq!(p.to_string(), "0px 0px");
    }

    #[test]
    fn wraps_to_next_row() {
        let p = frame_position(5, 4, 100.0, 50.0).unwrap();
        assert_eq!(p, BackgroundPosition { x: -100.0, y: -50.0 });
    }

    #[test]
    fn zero_columns_renders_nothing() {
        assert!(frame_position(3, 0, 100.0, 50.0).is_none());
    }

    #[test]
    fn formats_as_css() {
        let p = BackgroundPosition { x: -300.0, y: -100.0 };
        assert_eq!(p.to_string(), "-300px -100px");
        assert_eq!(BackgroundPosition::default().to_string(), "0px 0px");
    }
}
