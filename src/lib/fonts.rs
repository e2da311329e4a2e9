//! Font loading for the typeset export.
//!
//! Typeset PDFs reference the standard PDF base-14 families so nothing is embedded and
//! output looks the same in every viewer. genpdfi_extended still needs real glyph metrics
//! to break lines, so a matching system font is loaded for measurement only.

use std::fs;
use std::sync::Arc;

use fontdb::Database;
use genpdfi_extended::error::{Error, ErrorKind};
use genpdfi_extended::fonts::{FontData, FontFamily};
use log::debug;
use printpdf::BuiltinFont;
use rusttype::Font;

use crate::ReportError;

/// Base-14 families available to the typeset export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuiltinFamily {
    #[default]
    Helvetica,
    Times,
    Courier,
}

impl BuiltinFamily {
    /// Maps a family name (or common alias) to a base-14 family. Unknown names map to Helvetica.
    pub fn from_name(name: &str) -> BuiltinFamily {
        match name.trim().to_lowercase().as_str() {
            "times" | "timesnewroman" | "times new roman" | "serif" => BuiltinFamily::Times,
            "courier" | "couriernew" | "courier new" | "monospace" => BuiltinFamily::Courier,
            _ => BuiltinFamily::Helvetica,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinFamily::Helvetica => "helvetica",
            BuiltinFamily::Times => "times",
            BuiltinFamily::Courier => "courier",
        }
    }

    /// CSS `font-family` stack matching the built-in family.
    pub fn css_stack(&self) -> &'static str {
        match self {
            BuiltinFamily::Helvetica => "Helvetica, Arial, sans-serif",
            BuiltinFamily::Times => "\"Times New Roman\", Times, serif",
            BuiltinFamily::Courier => "\"Courier New\", Courier, monospace",
        }
    }

    /// System fonts whose metrics are close enough to stand in for the built-in family.
    fn metric_candidates(&self) -> &'static [&'static str] {
        match self {
            BuiltinFamily::Times => &["Times New Roman", "Times", "Liberation Serif"],
            BuiltinFamily::Courier => &["Courier New", "Courier", "Liberation Mono"],
            BuiltinFamily::Helvetica => &["Helvetica", "Arial", "Liberation Sans"],
        }
    }

    fn variant(&self, style: FontStyle) -> BuiltinFont {
        match self {
            BuiltinFamily::Helvetica => match style {
                FontStyle::Regular => BuiltinFont::Helvetica,
                FontStyle::Bold => BuiltinFont::HelveticaBold,
                FontStyle::Italic => BuiltinFont::HelveticaOblique,
                FontStyle::BoldItalic => BuiltinFont::HelveticaBoldOblique,
            },
            BuiltinFamily::Times => match style {
                FontStyle::Regular => BuiltinFont::TimesRoman,
                FontStyle::Bold => BuiltinFont::TimesBold,
                FontStyle::Italic => BuiltinFont::TimesItalic,
                FontStyle::BoldItalic => BuiltinFont::TimesBoldItalic,
            },
            BuiltinFamily::Courier => match style {
                FontStyle::Regular => BuiltinFont::Courier,
                FontStyle::Bold => BuiltinFont::CourierBold,
                FontStyle::Italic => BuiltinFont::CourierOblique,
                FontStyle::BoldItalic => BuiltinFont::CourierBoldOblique,
            },
        }
    }
}

#[derive(Clone, Copy)]
enum FontStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

/// Loads a base-14 font family for genpdfi_extended.
///
/// Rendering uses the PDF built-in font; the system font found for `family` only supplies
/// metrics.
pub fn load_builtin_font_family(family: BuiltinFamily) -> Result<FontFamily<FontData>, Error> {
    let font_bytes = Arc::new(load_metric_font_bytes(family.metric_candidates())?);

    let mk_data = |style: FontStyle| -> Result<FontData, Error> {
        FontData::new_shared(font_bytes.clone(), Some(family.variant(style)))
    };

    Ok(FontFamily {
        regular: mk_data(FontStyle::Regular)?,
        bold: mk_data(FontStyle::Bold)?,
        italic: mk_data(FontStyle::Italic)?,
        bold_italic: mk_data(FontStyle::BoldItalic)?,
    })
}

/// [`load_builtin_font_family`] with the error mapped for the export pipeline.
pub fn load_report_fonts(family: BuiltinFamily) -> Result<FontFamily<FontData>, ReportError> {
    load_builtin_font_family(family).map_err(|e| {
        ReportError::export_error("typeset", format!("{:?} font unavailable: {}", family, e))
            .with_suggestion(
                "Install a TrueType font such as Liberation Sans or DejaVu Sans for text metrics",
            )
    })
}

/// Finds a system font for metrics: a named candidate first, then any usable TTF/OTF file.
fn load_metric_font_bytes(candidates: &[&str]) -> Result<Vec<u8>, Error> {
    let mut db = Database::new();
    db.load_system_fonts();

    let files: Vec<_> = db
        .faces()
        .filter_map(|face| match &face.source {
            fontdb::Source::File(p) => Some(p.clone()),
            _ => None,
        })
        // rusttype cannot read .ttc collections directly
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
        })
        .collect();

    let matches_candidate = |path: &std::path::Path| {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_lowercase()
            .replace(' ', "");
        candidates
            .iter()
            .any(|cand| file_name.contains(&cand.to_lowercase().replace(' ', "")))
    };

    let preferred = files.iter().filter(|p| matches_candidate(p));
    let others = files.iter().filter(|p| !matches_candidate(p));
    for path in preferred.chain(others) {
        if let Ok(bytes) = fs::read(path) {
            if Font::try_from_bytes(&bytes).is_some() {
                debug!("Using {} for built-in font metrics", path.display());
                return Ok(bytes);
            }
        }
    }

    Err(Error::new(
        "No usable system font found for built-in font metrics".to_string(),
        ErrorKind::InvalidFont,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_aliases() {
        assert_eq!(BuiltinFamily::from_name("Arial"), BuiltinFamily::Helvetica);
        assert_eq!(BuiltinFamily::from_name("Times New Roman"), BuiltinFamily::Times);
        assert_eq!(BuiltinFamily::from_name("monospace"), BuiltinFamily::Courier);
        assert_eq!(BuiltinFamily::from_name(""), BuiltinFamily::Helvetica);
    }

    #[test]
    fn test_bold_variant_mapping() {
        assert!(matches!(
            BuiltinFamily::Times.variant(FontStyle::Bold),
            BuiltinFont::TimesBold
        ));
        assert!(matches!(
            BuiltinFamily::Helvetica.variant(FontStyle::BoldItalic),
            BuiltinFont::HelveticaBoldOblique
        ));
    }

    #[test]
    fn test_family_names_round_trip() {
        for family in [BuiltinFamily::Helvetica, BuiltinFamily::Times, BuiltinFamily::Courier] {
            assert_eq!(BuiltinFamily::from_name(family.name()), family);
        }
    }

    #[test]
    fn test_font_lookup_outcome_matches_host() {
        let has_usable_font = load_metric_font_bytes(&[]).is_ok();
        match load_report_fonts(BuiltinFamily::Courier) {
            Ok(_) => assert!(has_usable_font),
            Err(err) => {
                assert!(!has_usable_font);
                assert!(matches!(err, ReportError::ExportError { ref strategy, .. } if strategy == "typeset"));
            }
        }
    }
}
