//! Translators that run locally as letter substitutions.

use crate::catalog::CipherKind;
use crate::direction::Direction;

/// English letters `a..=z` in Al Bhed.
const AL_BHED: &[u8; 26] = b"ypltavkrezgmshubxncdijfqow";

const COMMON_ENGLISH: &[char] = &['e', 't', 'a', 'o', 'i', 'n', 's', 'h'];
/// The same letters after encoding.
const COMMON_AL_BHED: &[char] = &['a', 'd', 'y', 'u', 'e', 'h', 'c', 'r'];

const MIN_LETTERS: usize = 3;
const AMBIGUITY_RATIO: f64 = 0.1;

/// Digraphs come first so the greedy scan prefers them.
const RUNES: &[(&str, char)] = &[
    ("th", 'ᚦ'),
    ("ng", 'ᛜ'),
    ("ea", 'ᛠ'),
    ("a", 'ᚨ'),
    ("b", 'ᛒ'),
    ("c", 'ᚲ'),
    ("d", 'ᛞ'),
    ("e", 'ᛖ'),
    ("f", 'ᚠ'),
    ("g", 'ᚷ'),
    ("h", 'ᚺ'),
    ("i", 'ᛁ'),
    ("j", 'ᛃ'),
    ("k", 'ᚲ'),
    ("l", 'ᛚ'),
    ("m", 'ᛗ'),
    ("n", 'ᚾ'),
    ("o", 'ᛟ'),
    ("p", 'ᛈ'),
    ("q", 'ᚲ'),
    ("r", 'ᚱ'),
    ("s", 'ᛋ'),
    ("t", 'ᛏ'),
    ("u", 'ᚢ'),
    ("v", 'ᚹ'),
    ("w", 'ᚹ'),
    ("y", 'ᛃ'),
    ("z", 'ᛉ'),
    (".", '᛫'),
];

/// Reading runes back; shared glyphs resolve to one letter.
const RUNE_READINGS: &[(char, &str)] = &[
    ('ᚦ', "th"),
    ('ᛜ', "ng"),
    ('ᛠ', "ea"),
    ('ᚨ', "a"),
    ('ᛒ', "b"),
    ('ᛞ', "d"),
    ('ᛖ', "e"),
    ('ᚠ', "f"),
    ('ᚷ', "g"),
    ('ᚺ', "h"),
    ('ᛁ', "i"),
    ('ᛃ', "j"),
    ('ᚲ', "k"),
    ('ᛚ', "l"),
    ('ᛗ', "m"),
    ('ᚾ', "n"),
    ('ᛟ', "o"),
    ('ᛈ', "p"),
    ('ᚱ', "r"),
    ('ᛋ', "s"),
    ('ᛏ', "t"),
    ('ᚢ', "u"),
    ('ᚹ', "w"),
    ('ᛉ', "z"),
    ('᛫', "."),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherLanguage {
    English,
    Encoded,
    Unknown,
}

impl CipherLanguage {
    pub fn label(&self, kind: CipherKind) -> &'static str {
        match (self, kind) {
            (CipherLanguage::English, _) => "english",
            (CipherLanguage::Encoded, CipherKind::AlBhed) => "albhed",
            (CipherLanguage::Encoded, CipherKind::Runic) => "runic",
            (CipherLanguage::Unknown, _) => "unknown",
        }
    }
}

fn substitute(text: &str, lookup: impl Fn(u8) -> u8) -> String {
    text.chars()
        .map(|ch| {
            if !ch.is_ascii_alphabetic() {
                return ch;
            }
            let mapped = lookup(ch.to_ascii_lowercase() as u8) as char;
            if ch.is_ascii_uppercase() {
                mapped.to_ascii_uppercase()
            } else {
                mapped
            }
        })
        .collect()
}

pub fn al_bhed_encode(text: &str) -> String {
    substitute(text, |letter| AL_BHED[(letter - b'a') as usize])
}

pub fn al_bhed_decode(text: &str) -> String {
    substitute(text, |letter| {
        AL_BHED
            .iter()
            .position(|&encoded| encoded == letter)
            .map(|index| b'a' + index as u8)
            .unwrap_or(letter)
    })
}

/// Letter-frequency guess between English and Al Bhed.
pub fn detect_al_bhed(text: &str) -> CipherLanguage {
    let letters = text
        .chars()
        .filter(|ch| ch.is_ascii_alphabetic())
        .map(|ch| ch.to_ascii_lowercase())
        .collect::<Vec<_>>();
    if letters.len() < MIN_LETTERS {
        return CipherLanguage::Unknown;
    }

    let english = letters.iter().filter(|ch| COMMON_ENGLISH.contains(ch)).count();
    let al_bhed = letters.iter().filter(|ch| COMMON_AL_BHED.contains(ch)).count();
    let gap = (english as f64 - al_bhed as f64).abs();
    if gap < letters.len() as f64 * AMBIGUITY_RATIO {
        return CipherLanguage::Unknown;
    }
    if english > al_bhed {
        CipherLanguage::English
    } else {
        CipherLanguage::Encoded
    }
}

/// Decodes text that reads as Al Bhed, encodes everything else.
pub fn al_bhed_auto_translate(text: &str) -> String {
    match detect_al_bhed(text) {
        CipherLanguage::Encoded => al_bhed_decode(text),
        _ => al_bhed_encode(text),
    }
}

pub fn runic_encode(text: &str) -> String {
    let chars = text.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(text.len() * 3);
    let mut index = 0;
    while index < chars.len() {
        let pair = chars
            .get(index..index + 2)
            .map(|pair| pair.iter().map(|ch| ch.to_ascii_lowercase()).collect::<String>());
        if let Some(pair) = pair
            && let Some((_, rune)) = RUNES.iter().find(|(latin, _)| *latin == pair)
        {
            out.push(*rune);
            index += 2;
            continue;
        }

        let ch = chars[index];
        let single = ch.to_ascii_lowercase().to_string();
        match RUNES.iter().find(|(latin, _)| *latin == single) {
            Some((_, rune)) => out.push(*rune),
            None if ch.eq_ignore_ascii_case(&'x') => out.push_str("ᚲᛋ"),
            None => out.push(ch),
        }
        index += 1;
    }
    out
}

pub fn runic_decode(text: &str) -> String {
    text.chars()
        .map(|ch| {
            RUNE_READINGS
                .iter()
                .find(|(rune, _)| *rune == ch)
                .map(|(_, latin)| latin.to_string())
                .unwrap_or_else(|| ch.to_string())
        })
        .collect()
}

pub fn contains_runes(text: &str) -> bool {
    text.chars().any(|ch| ('\u{16A0}'..='\u{16FF}').contains(&ch))
}

pub fn detect(kind: CipherKind, text: &str) -> CipherLanguage {
    match kind {
        CipherKind::AlBhed => detect_al_bhed(text),
        CipherKind::Runic => {
            if contains_runes(text) {
                CipherLanguage::Encoded
            } else if text.chars().any(|ch| ch.is_ascii_alphabetic()) {
                CipherLanguage::English
            } else {
                CipherLanguage::Unknown
            }
        }
    }
}

/// Runs the cipher in `direction`: English sources are encoded, anything
/// else is decoded.
pub fn apply(kind: CipherKind, direction: &Direction, text: &str) -> String {
    let encode = direction.is_from_english();
    match (kind, encode) {
        (CipherKind::AlBhed, true) => al_bhed_encode(text),
        (CipherKind::AlBhed, false) => al_bhed_decode(text),
        (CipherKind::Runic, true) => runic_encode(text),
        (CipherKind::Runic, false) => runic_decode(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn al_bhed_table_is_a_bijection() {
        let mut seen = AL_BHED.to_vec();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 26);
    }

    #[test]
    fn al_bhed_preserves_case_and_punctuation() {
        assert_eq!(al_bhed_encode("Hello, World! 42"), "Rammu, Funmt! 42");
        assert_eq!(al_bhed_decode("Rammu, Funmt! 42"), "Hello, World! 42");
    }

    #[test]
    fn decoding_inverts_encoding() {
        let text = "The Quick Brown Fox jumps over 13 lazy dogs.";
        assert_eq!(al_bhed_decode(&al_bhed_encode(text)), text);
    }

    #[test]
    fn frequency_detection() {
        assert_eq!(
            detect_al_bhed("this is the english sentence"),
            CipherLanguage::English
        );
        assert_eq!(
            detect_al_bhed("Drec ec dra ahkmecr cahdahla"),
            CipherLanguage::Encoded
        );
        assert_eq!(detect_al_bhed("hi"), CipherLanguage::Unknown);
        assert_eq!(detect_al_bhed("hello world"), CipherLanguage::Unknown);
    }

    #[test]
    fn auto_translate_picks_a_side() {
        assert_eq!(
            al_bhed_auto_translate("Drec ec dra ahkmecr cahdahla"),
            "This is the english sentence"
        );
        assert_eq!(al_bhed_auto_translate("hi"), "re");
    }

    #[test]
    fn runic_prefers_digraphs() {
        assert_eq!(runic_encode("The King"), "ᚦᛖ ᚲᛁᛜ");
        assert_eq!(runic_encode("sea"), "ᛋᛠ");
        assert_eq!(runic_encode("fox!"), "ᚠᛟᚲᛋ!");
        assert_eq!(runic_encode("ünïcode"), "üᚾïᚲᛟᛞᛖ");
    }

    #[test]
    fn runic_reads_back() {
        assert_eq!(runic_decode("ᚦᛖ ᚲᛁᛜ᛫"), "the king.");
        assert!(contains_runes("ᚠᛖᚺᚢ"));
        assert!(!contains_runes("fehu"));
    }

    #[test]
    fn apply_follows_direction() {
        let to_albhed: Direction = "en-to-albhed".parse().unwrap();
        assert_eq!(apply(CipherKind::AlBhed, &to_albhed, "Hello"), "Rammu");
        assert_eq!(apply(CipherKind::AlBhed, &to_albhed.reversed(), "Rammu"), "Hello");
        let to_runic: Direction = "en-to-runic".parse().unwrap();
        assert_eq!(apply(CipherKind::Runic, &to_runic, "ng"), "ᛜ");
    }

    #[test]
    fn detection_labels() {
        assert_eq!(detect(CipherKind::Runic, "ᚠᛖᚺᚢ").label(CipherKind::Runic), "runic");
        assert_eq!(detect(CipherKind::Runic, "fehu").label(CipherKind::Runic), "english");
        assert_eq!(detect(CipherKind::Runic, "123").label(CipherKind::Runic), "unknown");
    }
}
