//! Physical page formats and their conversion to screen pixels and PDF points.

use log::warn;
use std::fmt;

/// Default screen resolution used for on-screen page previews.
pub const DEFAULT_DPI: f32 = 96.0;

/// Top and bottom print margin shared by every export strategy.
pub const MARGIN_VERTICAL_IN: f32 = 0.75;
/// Left and right print margin shared by every export strategy.
pub const MARGIN_HORIZONTAL_IN: f32 = 0.5;

const MM_PER_INCH: f32 = 25.4;
const POINTS_PER_INCH: f32 = 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageFormat {
    #[default]
    Letter,
    A4,
    Legal,
}

impl PageFormat {
    /// Parses a format name case-insensitively. Unknown names fall back to Letter.
    pub fn parse(name: &str) -> PageFormat {
        match name.trim().to_lowercase().as_str() {
            "a4" => PageFormat::A4,
            "legal" => PageFormat::Legal,
            "letter" => PageFormat::Letter,
            other => {
                warn!("Unknown page format '{}', using letter", other);
                PageFormat::Letter
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PageFormat::Letter => "letter",
            PageFormat::A4 => "a4",
            PageFormat::Legal => "legal",
        }
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Inches,
    Millimeters,
}

impl LengthUnit {
    pub fn css_suffix(&self) -> &'static str {
        match self {
            LengthUnit::Inches => "in",
            LengthUnit::Millimeters => "mm",
        }
    }
}

/// Physical size of a page in its native unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageDimensions {
    pub width: f32,
    pub height: f32,
    pub unit: LengthUnit,
}

impl PageDimensions {
    /// Width and height converted to inches.
    pub fn to_inches(&self) -> (f32, f32) {
        match self.unit {
            LengthUnit::Inches => (self.width, self.height),
            LengthUnit::Millimeters => (self.width / MM_PER_INCH, self.height / MM_PER_INCH),
        }
    }

    pub fn to_millimeters(&self) -> (f32, f32) {
        match self.unit {
            LengthUnit::Inches => (self.width * MM_PER_INCH, self.height * MM_PER_INCH),
            LengthUnit::Millimeters => (self.width, self.height),
        }
    }

    /// Width and height in PDF points (1/72 in).
    pub fn to_points(&self) -> (f32, f32) {
        let (w, h) = self.to_inches();
        (w * POINTS_PER_INCH, h * POINTS_PER_INCH)
    }

    /// Value for a CSS `@page { size: ... }` rule, e.g. `8.5in 11in`.
    pub fn css_size(&self) -> String {
        let suffix = self.unit.css_suffix();
        format!("{}{} {}{}", self.width, suffix, self.height, suffix)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelDimensions {
    pub width: f32,
    pub height: f32,
}

impl PixelDimensions {
    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }
}

pub fn dimensions(format: PageFormat) -> PageDimensions {
    match format {
        PageFormat::Letter => PageDimensions {
            width: 8.5,
            height: 11.0,
            unit: LengthUnit::Inches,
        },
        PageFormat::A4 => PageDimensions {
            width: 210.0,
            height: 297.0,
            unit: LengthUnit::Millimeters,
        },
        PageFormat::Legal => PageDimensions {
            width: 8.5,
            height: 14.0,
            unit: LengthUnit::Inches,
        },
    }
}

/// Converts physical dimensions to pixels at `dpi`, scaled by `zoom_percent / 100`.
pub fn to_pixels(dims: PageDimensions, dpi: f32, zoom_percent: f32) -> PixelDimensions {
    let (w_in, h_in) = dims.to_inches();
    let scale = zoom_percent / 100.0;
    PixelDimensions {
        width: w_in * dpi * scale,
        height: h_in * dpi * scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_letter_pixels_at_default_dpi() {
        let px = to_pixels(dimensions(PageFormat::Letter), DEFAULT_DPI, 100.0);
        assert!(approx(px.width, 816.0));
        assert!(approx(px.height, 1056.0));

        let half = to_pixels(dimensions(PageFormat::Letter), DEFAULT_DPI, 50.0);
        assert!(approx(half.width, 408.0));
        assert!(approx(half.height, 528.0));
    }

    #[test]
    fn test_a4_converts_from_millimeters() {
        let px = to_pixels(dimensions(PageFormat::A4), DEFAULT_DPI, 100.0);
        assert!(approx(px.width, 210.0 / 25.4 * 96.0));
        assert!(approx(px.height, 297.0 / 25.4 * 96.0));
    }

    #[test]
    fn test_aspect_ratio_is_zoom_invariant() {
        for format in [PageFormat::Letter, PageFormat::A4, PageFormat::Legal] {
            let dims = dimensions(format);
            for zoom in [25.0, 50.0, 75.0, 100.0, 150.0, 200.0] {
                let px = to_pixels(dims, DEFAULT_DPI, zoom);
                assert!((px.aspect_ratio() - dims.aspect_ratio()).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_parse_falls_back_to_letter() {
        assert_eq!(PageFormat::parse("A4"), PageFormat::A4);
        assert_eq!(PageFormat::parse(" legal "), PageFormat::Legal);
        assert_eq!(PageFormat::parse("tabloid"), PageFormat::Letter);
        assert_eq!(PageFormat::parse(""), PageFormat::Letter);
    }

    #[test]
    fn test_points_and_css_size() {
        let (w, h) = dimensions(PageFormat::Letter).to_points();
        assert!(approx(w, 612.0));
        assert!(approx(h, 792.0));
        assert_eq!(dimensions(PageFormat::Letter).css_size(), "8.5in 11in");
        assert_eq!(dimensions(PageFormat::A4).css_size(), "210mm 297mm");
    }
}
