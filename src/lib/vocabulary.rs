//! Fixed visual vocabulary: rating badge colors and country flags.

use crate::report::Rating;

/// Flag shown for countries outside the lookup table.
pub const DEFAULT_FLAG: &str = "\u{1F310}";

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

pub const GREEN: Rgb = Rgb(22, 163, 74);
pub const AMBER: Rgb = Rgb(217, 119, 6);
pub const RED: Rgb = Rgb(220, 38, 38);
pub const GRAY: Rgb = Rgb(107, 114, 128);

/// Brand color used for headers and rules.
pub const BRAND: Rgb = Rgb(30, 58, 138);

pub fn rating_color(rating: Rating) -> Rgb {
    match rating {
        Rating::StrongBuy | Rating::Buy => GREEN,
        Rating::Hold => AMBER,
        Rating::Sell | Rating::StrongSell => RED,
        Rating::Unrated => GRAY,
    }
}

const COUNTRY_FLAGS: &[(&str, &str)] = &[
    ("united states", "\u{1F1FA}\u{1F1F8}"),
    ("united kingdom", "\u{1F1EC}\u{1F1E7}"),
    ("canada", "\u{1F1E8}\u{1F1E6}"),
    ("germany", "\u{1F1E9}\u{1F1EA}"),
    ("france", "\u{1F1EB}\u{1F1F7}"),
    ("switzerland", "\u{1F1E8}\u{1F1ED}"),
    ("netherlands", "\u{1F1F3}\u{1F1F1}"),
    ("sweden", "\u{1F1F8}\u{1F1EA}"),
    ("norway", "\u{1F1F3}\u{1F1F4}"),
    ("denmark", "\u{1F1E9}\u{1F1F0}"),
    ("italy", "\u{1F1EE}\u{1F1F9}"),
    ("spain", "\u{1F1EA}\u{1F1F8}"),
    ("ireland", "\u{1F1EE}\u{1F1EA}"),
    ("japan", "\u{1F1EF}\u{1F1F5}"),
    ("china", "\u{1F1E8}\u{1F1F3}"),
    ("hong kong", "\u{1F1ED}\u{1F1F0}"),
    ("singapore", "\u{1F1F8}\u{1F1EC}"),
    ("australia", "\u{1F1E6}\u{1F1FA}"),
    ("india", "\u{1F1EE}\u{1F1F3}"),
    ("south korea", "\u{1F1F0}\u{1F1F7}"),
    ("brazil", "\u{1F1E7}\u{1F1F7}"),
    ("united arab emirates", "\u{1F1E6}\u{1F1EA}"),
];

/// Flag emoji for a country name (case-insensitive, a few common aliases accepted).
pub fn country_flag(country: &str) -> &'static str {
    let key = country.trim().to_lowercase();
    let key = match key.as_str() {
        "usa" | "us" | "united states of america" => "united states",
        "uk" | "great britain" | "england" => "united kingdom",
        "korea" | "republic of korea" => "south korea",
        "uae" => "united arab emirates",
        other => other,
    };
    COUNTRY_FLAGS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, flag)| *flag)
        .unwrap_or(DEFAULT_FLAG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_colors() {
        assert_eq!(rating_color(Rating::Buy), GREEN);
        assert_eq!(rating_color(Rating::StrongBuy), GREEN);
        assert_eq!(rating_color(Rating::Hold), AMBER);
        assert_eq!(rating_color(Rating::Sell), RED);
        assert_eq!(rating_color(Rating::Unrated), GRAY);
        assert_eq!(GREEN.hex(), "#16a34a");
    }

    #[test]
    fn test_country_flags() {
        assert_eq!(country_flag("Japan"), "\u{1F1EF}\u{1F1F5}");
        assert_eq!(country_flag(" USA "), "\u{1F1FA}\u{1F1F8}");
        assert_eq!(country_flag("UK"), "\u{1F1EC}\u{1F1E7}");
        assert_eq!(country_flag("Atlantis"), DEFAULT_FLAG);
        assert_eq!(country_flag(""), DEFAULT_FLAG);
    }
}
