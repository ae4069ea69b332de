//! Shared colors and sizes for the SVG renderers.

use plotters::style::RGBColor;

/// Default canvas size in pixels.
pub const CANVAS: (u32, u32) = (800, 600);

pub const FONT: &str = "sans-serif";

/// Qualitative palette (Okabe-Ito), cycled by index.
pub const PALETTE: [RGBColor; 8] = [
    RGBColor(0, 114, 178),
    RGBColor(230, 159, 0),
    RGBColor(0, 158, 115),
    RGBColor(204, 121, 167),
    RGBColor(86, 180, 233),
    RGBColor(213, 94, 0),
    RGBColor(240, 228, 66),
    RGBColor(0, 0, 0),
];

/// Palette color for a group index.
pub fn color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

/// Diverging blue-white-red color for a value in [-1, 1].
pub fn diverging(value: f64) -> RGBColor {
    let v = if value.is_finite() { value.clamp(-1.0, 1.0) } else { 0.0 };
    let lerp = |from: u8, to: u8, t: f64| (from as f64 + (to as f64 - from as f64) * t).round() as u8;
    if v < 0.0 {
        let t = -v;
        RGBColor(lerp(255, 33, t), lerp(255, 102, t), lerp(255, 172, t))
    } else {
        RGBColor(lerp(255, 178, v), lerp(255, 24, v), lerp(255, 43, v))
    }
}

/// Padded axis range covering `values` (and zero when `include_zero`).
pub fn axis_range(values: impl IntoIterator<Item = f64>, include_zero: bool) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    if (hi - lo).abs() < 1e-12 {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = 0.05 * (hi - lo);
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diverging_endpoints() {
        assert_eq!(diverging(0.0), RGBColor(255, 255, 255));
        assert_eq!(diverging(1.0), RGBColor(178, 24, 43));
        assert_eq!(diverging(-2.0), RGBColor(33, 102, 172));
    }

    #[test]
    fn test_axis_range() {
        let (lo, hi) = axis_range(vec![1.0, 3.0], true);
        assert!(lo < 0.0 && hi > 3.0);
        assert_eq!(axis_range(vec![2.0], false), (1.0, 3.0));
        assert_eq!(axis_range(Vec::<f64>::new(), false), (-1.0, 1.0));
    }
}
