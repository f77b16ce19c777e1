//! Repair of Bengali text as it typically comes out of PDF extraction.
//!
//! Extractors split conjuncts, leave stray hasantas in front of vowel signs and
//! paint dotted-circle placeholders under dependent signs. The fixes are plain
//! data in [`CONJUNCT_REPAIRS`], applied in order after NFC composition.

use unicode_normalization::UnicodeNormalization;

/// Ordered `(broken, repaired)` pairs. Every repair is strictly shorter than
/// the sequence it replaces.
pub const CONJUNCT_REPAIRS: &[(&str, &str)] = &[
    // khanda ta written as ta + hasanta + ZWJ
    ("\u{09A4}\u{09CD}\u{200D}", "\u{09CE}"),
    // doubled hasanta
    ("\u{09CD}\u{09CD}", "\u{09CD}"),
    // hasanta swallowed in front of a vowel sign
    ("\u{09CD}\u{09BE}", "\u{09BE}"),
    ("\u{09CD}\u{09BF}", "\u{09BF}"),
    ("\u{09CD}\u{09C0}", "\u{09C0}"),
    ("\u{09CD}\u{09C1}", "\u{09C1}"),
    ("\u{09CD}\u{09C2}", "\u{09C2}"),
    ("\u{09CD}\u{09C3}", "\u{09C3}"),
    ("\u{09CD}\u{09C7}", "\u{09C7}"),
    ("\u{09CD}\u{09C8}", "\u{09C8}"),
    ("\u{09CD}\u{09CB}", "\u{09CB}"),
    ("\u{09CD}\u{09CC}", "\u{09CC}"),
    // dotted-circle placeholders left in front of dependent signs
    ("\u{25CC}\u{09BE}", "\u{09BE}"),
    ("\u{25CC}\u{09BF}", "\u{09BF}"),
    ("\u{25CC}\u{09C0}", "\u{09C0}"),
    ("\u{25CC}\u{09C1}", "\u{09C1}"),
    ("\u{25CC}\u{09C2}", "\u{09C2}"),
    ("\u{25CC}\u{09C3}", "\u{09C3}"),
    ("\u{25CC}\u{09C7}", "\u{09C7}"),
    ("\u{25CC}\u{09C8}", "\u{09C8}"),
    ("\u{25CC}\u{09CB}", "\u{09CB}"),
    ("\u{25CC}\u{09CC}", "\u{09CC}"),
    ("\u{25CC}\u{09CD}", "\u{09CD}"),
    ("\u{25CC}\u{0981}", "\u{0981}"),
    ("\u{25CC}\u{0982}", "\u{0982}"),
    // independent a followed by aa sign instead of independent aa
    ("\u{0985}\u{09BE}", "\u{0986}"),
];

const INVISIBLE: [char; 3] = ['\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Repairs, strips joiners and collapses all whitespace into single spaces.
pub fn normalize(text: &str) -> String {
    normalize_whitespace(&repair(text))
}

/// Like [`normalize`] but keeps line breaks and blank-line paragraph breaks,
/// so the chunker still has structure to split on.
pub fn normalize_document(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = normalize(line);
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs.join("\n\n")
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn repair(text: &str) -> String {
    let mut current: String = text.nfc().collect();
    loop {
        let next: String = strip_invisible(&apply_repairs(&current)).nfc().collect();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn apply_repairs(text: &str) -> String {
    CONJUNCT_REPAIRS
        .iter()
        .fold(text.to_string(), |acc, (broken, repaired)| {
            if acc.contains(broken) {
                acc.replace(broken, repaired)
            } else {
                acc
            }
        })
}

fn strip_invisible(text: &str) -> String {
    text.chars().filter(|ch| !INVISIBLE.contains(ch)).collect()
}
