//! HTS chapter to section mapping.
//!
//! The Harmonized Tariff Schedule groups its 99 chapters into 22 sections
//! identified by Roman numerals. The grouping is fixed by the schedule
//! itself and changes only with a treaty revision, so it is a static table.

/// Inclusive chapter ranges and their section numerals.
const SECTIONS: [(u8, u8, &str); 22] = [
    (1, 5, "I"),
    (6, 14, "II"),
    (15, 15, "III"),
    (16, 24, "IV"),
    (25, 27, "V"),
    (28, 38, "VI"),
    (39, 40, "VII"),
    (41, 43, "VIII"),
    (44, 46, "IX"),
    (47, 49, "X"),
    (50, 63, "XI"),
    (64, 67, "XII"),
    (68, 70, "XIII"),
    (71, 83, "XIV"),
    (84, 85, "XV"),
    (86, 89, "XVI"),
    (90, 92, "XVII"),
    (93, 94, "XVIII"),
    (95, 95, "XIX"),
    (96, 96, "XX"),
    (97, 97, "XXI"),
    (98, 99, "XXII"),
];

/// Returns the section numeral for an HTS chapter, or `None` for chapter 0
/// (unparseable heading) and anything past 99.
pub fn chapter_to_section(chapter: u8) -> Option<&'static str> {
    SECTIONS
        .iter()
        .find(|(lo, hi, _)| (*lo..=*hi).contains(&chapter))
        .map(|(_, _, sec)| *sec)
}

/// Formats the development citation line used by the API and CLI,
/// e.g. `HTSUS §XI, Ch.52, 5208110000`.
pub fn dev_citation(chapter: u8, hts10: &str) -> String {
    let section = chapter_to_section(chapter).unwrap_or("?");
    format!("HTSUS §{}, Ch.{}, {}", section, chapter, hts10)
}
