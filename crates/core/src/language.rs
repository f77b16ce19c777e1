use crate::models::{Language, LanguagePreference};

const BENGALI_BLOCK: std::ops::RangeInclusive<char> = '\u{0980}'..='\u{09FF}';

/// Share of characters that must be Bengali, strictly exceeded, for a text to
/// count as Bengali.
pub const BENGALI_SHARE: f64 = 0.1;

/// Bengali when more than 10% of the characters fall in the Bengali block.
/// The empty string is English.
pub fn detect(text: &str) -> Language {
    let (total, bengali) = text.chars().fold((0usize, 0usize), |(total, bengali), ch| {
        (total + 1, bengali + usize::from(BENGALI_BLOCK.contains(&ch)))
    });

    if total > 0 && bengali as f64 > total as f64 * BENGALI_SHARE {
        Language::Bengali
    } else {
        Language::English
    }
}

pub fn resolve(preference: LanguagePreference, text: &str) -> Language {
    match preference {
        LanguagePreference::Auto => detect(text),
        LanguagePreference::Primary => Language::Bengali,
        LanguagePreference::Other => Language::English,
    }
}
