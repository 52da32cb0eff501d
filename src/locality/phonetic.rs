//! Fuzzy phonetic coding of single words.
//!
//! Words containing a digit are coded literally (`#` + word) so that
//! "Highway 290" never matches "Highway 209". Every other word gets a
//! Fuzzy-Soundex style code: leading and trailing clusters are normalized,
//! common digraphs rewritten, letters mapped to sound classes, repeats
//! squeezed, the initial letter kept and vowels dropped.

use std::num::NonZeroUsize;

use lru::LruCache;

/// Prefix marking a literal (digit-bearing) code.
pub const LITERAL_CODE_PREFIX: char = '#';

/// Default number of memoized word codes.
pub const DEFAULT_MEMO_CAPACITY: usize = 4096;

/// Sound class per letter `A..=Z`. `0` is a vowel, `-` is transparent.
const SOUND_CLASSES: &[u8; 26] = b"0193017-07745501769301-7-9";

const PREFIX_RULES: &[(&str, &str)] = &[
    ("CS", "SS"),
    ("CZ", "SS"),
    ("TS", "SS"),
    ("TZ", "SS"),
    ("GN", "NN"),
    ("HR", "RR"),
    ("WR", "RR"),
    ("KN", "NN"),
    ("PF", "FF"),
];

const SUFFIX_RULES: &[(&str, &str)] = &[
    ("CS", "SS"),
    ("CZ", "SS"),
    ("TS", "SS"),
    ("TZ", "SS"),
    ("IE", "YY"),
    ("EE", "YY"),
];

const DIGRAPH_RULES: &[(&str, &str)] = &[
    ("CA", "KA"),
    ("CC", "KK"),
    ("CK", "KK"),
    ("CE", "SE"),
    ("CHL", "KL"),
    ("CL", "KL"),
    ("CHR", "KR"),
    ("CR", "KR"),
    ("CI", "SI"),
    ("CO", "KO"),
    ("CU", "KU"),
    ("CY", "SY"),
    ("DG", "GG"),
    ("GH", "HH"),
    ("MAC", "MK"),
    ("MC", "MK"),
    ("NSTL", "NSSL"),
    ("PF", "FF"),
    ("PH", "FF"),
    ("SCH", "SSS"),
    ("TIO", "SIO"),
    ("TIA", "SIO"),
    ("TCH", "CHH"),
];

/// Returns the phonetic code of an already-normalized word.
pub fn phonetic_code(word: &str) -> String {
    if word.bytes().any(|b| b.is_ascii_digit()) {
        let mut code = String::with_capacity(word.len() + 1);
        code.push(LITERAL_CODE_PREFIX);
        code.push_str(word);
        return code;
    }
    fuzzy_soundex(word)
}

/// Fuzzy-Soundex code of the alphabetic characters of `word`.
pub fn fuzzy_soundex(word: &str) -> String {
    let mut name: String = word
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if name.is_empty() {
        return name;
    }

    for (from, to) in PREFIX_RULES {
        if let Some(rest) = name.strip_prefix(from) {
            name = format!("{to}{rest}");
            break;
        }
    }
    for (from, to) in SUFFIX_RULES {
        if name.len() > from.len() {
            if let Some(head) = name.strip_suffix(from) {
                name = format!("{head}{to}");
                break;
            }
        }
    }
    for (from, to) in DIGRAPH_RULES {
        if name.contains(from) {
            name = name.replace(from, to);
        }
    }

    let bytes = name.as_bytes();
    let mut code = String::with_capacity(bytes.len());
    code.push(bytes[0] as char);
    let mut previous = sound_class(bytes[0]);
    for &letter in &bytes[1..] {
        let class = sound_class(letter);
        if class == b'-' || class == previous {
            continue;
        }
        previous = class;
        if class != b'0' {
            code.push(class as char);
        }
    }
    code
}

fn sound_class(letter: u8) -> u8 {
    SOUND_CLASSES[usize::from(letter - b'A')]
}

/// Memoizing wrapper around [`phonetic_code`].
///
/// Locality names repeat the same vocabulary heavily ("creek", "road",
/// "ranch"), so codes are kept in a bounded LRU keyed by word.
pub struct PhoneticEncoder {
    memo: LruCache<String, String>,
    hits: u64,
    misses: u64,
}

impl PhoneticEncoder {
    /// Creates an encoder remembering at most `capacity` words.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            memo: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Returns the phonetic code for `word`.
    pub fn encode(&mut self, word: &str) -> String {
        if let Some(code) = self.memo.get(word) {
            self.hits += 1;
            return code.clone();
        }
        self.misses += 1;
        let code = phonetic_code(word);
        self.memo.put(word.to_string(), code.clone());
        code
    }

    /// Returns `(hits, misses)` since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

impl Default for PhoneticEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MEMO_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_keep_initial_and_drop_vowels() {
        assert_eq!(fuzzy_soundex("zilker"), "Z476");
        assert_eq!(fuzzy_soundex("foo"), "F");
        assert_eq!(fuzzy_soundex("forest"), "F693");
        assert_eq!(fuzzy_soundex("bar"), "B6");
        assert_eq!(fuzzy_soundex("park"), "P67");
        assert_eq!(fuzzy_soundex("preserve"), "P6961");
    }

    #[test]
    fn similar_spellings_share_codes() {
        assert_eq!(fuzzy_soundex("philips"), fuzzy_soundex("filips"));
        assert_eq!(fuzzy_soundex("knight"), fuzzy_soundex("night"));
        assert_eq!(fuzzy_soundex("smith"), fuzzy_soundex("smyth"));
        assert_eq!(fuzzy_soundex("catherine"), fuzzy_soundex("katherine"));
    }

    #[test]
    fn different_sounds_get_different_codes() {
        assert_ne!(fuzzy_soundex("creek"), fuzzy_soundex("canyon"));
        assert_ne!(fuzzy_soundex("pecan"), fuzzy_soundex("bacon"));
    }

    #[test]
    fn digit_words_are_literal() {
        assert_eq!(phonetic_code("290"), "#290");
        assert_eq!(phonetic_code("12a"), "#12a");
        assert_ne!(phonetic_code("290"), phonetic_code("209"));
    }

    #[test]
    fn encoder_memoizes() {
        let mut encoder = PhoneticEncoder::new(2);
        assert_eq!(encoder.encode("creek"), fuzzy_soundex("creek"));
        assert_eq!(encoder.encode("creek"), fuzzy_soundex("creek"));
        assert_eq!(encoder.stats(), (1, 1));
        encoder.encode("ranch");
        encoder.encode("road");
        encoder.encode("creek");
        assert_eq!(encoder.stats(), (1, 4));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut encoder = PhoneticEncoder::new(0);
        assert_eq!(encoder.encode("mill"), "M4");
        assert_eq!(encoder.encode("mill"), "M4");
        assert_eq!(encoder.stats(), (1, 1));
    }
}
