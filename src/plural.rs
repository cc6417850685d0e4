//! Per-language plural rules.
//!
//! Each rule is a closed-form function from an integer count to a CLDR
//! plural category, together with the ordered list of categories a catalog
//! in that language stores forms for. Form slot `i` of a plural message
//! holds the text for `categories()[i]`.

use serde::Serialize;

/// CLDR plural category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

/// Plural rule families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluralRule {
    /// `one` for exactly 1, `other` otherwise (English, German, ...).
    OneOther,
    /// `one` for 0 and 1 (French, Brazilian Portuguese).
    ZeroOneAsOne,
    /// Czech and Slovak: 1, 2–4, fractions, everything else.
    CzechSlovak,
    /// Polish.
    Polish,
    /// Russian, Ukrainian, Belarusian.
    EastSlavic,
    /// Arabic: six categories.
    Arabic,
    /// A single form for every count (Japanese, Chinese, ...).
    NoPlural,
}

impl PluralRule {
    /// Rule used when a catalog declares no language or an unknown one.
    pub const DEFAULT: PluralRule = PluralRule::OneOther;

    /// Find the rule for a language tag such as `"cs"`, `"cs_CZ"` or
    /// `"pt-BR"`. Returns `None` for languages missing from the table.
    pub fn for_language(language: &str) -> Option<Self> {
        let primary = primary_subtag(language);
        let rule = match primary.as_str() {
            "cs" | "sk" => PluralRule::CzechSlovak,
            "pl" => PluralRule::Polish,
            "ru" | "uk" | "be" => PluralRule::EastSlavic,
            "ar" => PluralRule::Arabic,
            "fr" => PluralRule::ZeroOneAsOne,
            "pt" if is_brazilian(language) => PluralRule::ZeroOneAsOne,
            "ja" | "zh" | "ko" | "vi" | "th" | "id" | "ms" | "lo" | "my" => {
                PluralRule::NoPlural
            }
            "en" | "de" | "nl" | "sv" | "da" | "nb" | "nn" | "no" | "fi" | "es"
            | "it" | "el" | "hu" | "et" | "ca" | "tr" | "pt" | "bg" | "eu" | "gl"
            | "eo" | "fa" | "he" | "hi" | "is" | "ka" | "kk" | "az" | "sq" | "ur" => {
                PluralRule::OneOther
            }
            _ => return None,
        };
        Some(rule)
    }

    /// Ordered categories a catalog in this language stores forms for.
    pub fn categories(self) -> &'static [PluralCategory] {
        use PluralCategory::*;
        match self {
            PluralRule::OneOther | PluralRule::ZeroOneAsOne => &[One, Other],
            PluralRule::CzechSlovak | PluralRule::Polish | PluralRule::EastSlavic => {
                &[One, Few, Many, Other]
            }
            PluralRule::Arabic => &[Zero, One, Two, Few, Many, Other],
            PluralRule::NoPlural => &[Other],
        }
    }

    /// Number of form slots per plural message.
    pub fn form_count(self) -> usize {
        self.categories().len()
    }

    /// Category for an integer count.
    pub fn categorize(self, count: u64) -> PluralCategory {
        let n10 = count % 10;
        let n100 = count % 100;
        match self {
            PluralRule::OneOther => {
                if count == 1 {
                    PluralCategory::One
                } else {
                    PluralCategory::Other
                }
            }
            PluralRule::ZeroOneAsOne => {
                if count <= 1 {
                    PluralCategory::One
                } else {
                    PluralCategory::Other
                }
            }
            // `many` only applies to fractional quantities.
            PluralRule::CzechSlovak => match count {
                1 => PluralCategory::One,
                2..=4 => PluralCategory::Few,
                _ => PluralCategory::Other,
            },
            PluralRule::Polish => {
                if count == 1 {
                    PluralCategory::One
                } else if (2..=4).contains(&n10) && !(12..=14).contains(&n100) {
                    PluralCategory::Few
                } else {
                    PluralCategory::Many
                }
            }
            PluralRule::EastSlavic => {
                if n10 == 1 && n100 != 11 {
                    PluralCategory::One
                } else if (2..=4).contains(&n10) && !(12..=14).contains(&n100) {
                    PluralCategory::Few
                } else {
                    PluralCategory::Many
                }
            }
            PluralRule::Arabic => match count {
                0 => PluralCategory::Zero,
                1 => PluralCategory::One,
                2 => PluralCategory::Two,
                _ if (3..=10).contains(&n100) => PluralCategory::Few,
                _ if (11..=99).contains(&n100) => PluralCategory::Many,
                _ => PluralCategory::Other,
            },
            PluralRule::NoPlural => PluralCategory::Other,
        }
    }

    /// Form slot for a count. Categories the language does not store a
    /// form for map to the last slot.
    pub fn form_index(self, count: u64) -> usize {
        let category = self.categorize(count);
        let categories = self.categories();
        categories
            .iter()
            .position(|c| *c == category)
            .unwrap_or(categories.len() - 1)
    }

    /// Slot holding the `other` form, which covers the most counts.
    pub fn other_index(self) -> usize {
        self.form_count() - 1
    }
}

/// Category for `count` under the rule of `language`, falling back to
/// [`PluralRule::DEFAULT`] for unknown languages.
pub fn plural_category(language: &str, count: u64) -> PluralCategory {
    PluralRule::for_language(language)
        .unwrap_or(PluralRule::DEFAULT)
        .categorize(count)
}

/// Lowercased primary language subtag: `"cs_CZ"` → `"cs"`.
pub(crate) fn primary_subtag(language: &str) -> String {
    language
        .split(['_', '-'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn is_brazilian(language: &str) -> bool {
    language
        .split(['_', '-'])
        .nth(1)
        .is_some_and(|region| region.eq_ignore_ascii_case("br"))
}
