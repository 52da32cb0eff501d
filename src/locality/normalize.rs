//! Name tokenization shared by term derivation and highlight marking.
//!
//! Both consumers must agree on what a "word" is, so the tokenizer reports
//! each retained word together with the byte range it occupies in the
//! original (unfolded) name.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_properties::{GeneralCategoryGroup, UnicodeGeneralCategory};

/// Words shorter than this many folded characters are never retained.
pub const MIN_WORD_LEN: usize = 3;

/// Words dropped from every name before phonetic coding.
pub const STOP_WORDS: &[&str] = &[
    "about", "above", "along", "and", "are", "around", "between", "but", "for", "from", "into",
    "its", "near", "nor", "off", "onto", "the", "then", "upon", "via", "was", "with",
];

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("[a-z0-9]{{{MIN_WORD_LEN},}}")).expect("word pattern is valid")
});

/// A retained word and its location in the original name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameToken {
    /// Folded, lower-cased ASCII text of the word.
    pub text: String,
    /// Byte offset of the word's first character in the original name.
    pub start: usize,
    /// Byte offset just past the word's last character in the original name.
    pub end: usize,
}

/// Splits `name` into retained words in occurrence order.
pub fn tokenize(name: &str) -> Vec<NameToken> {
    let folded = FoldedName::new(name);
    WORD_RE
        .find_iter(&folded.text)
        .filter(|m| !is_stop_word(m.as_str()))
        .map(|m| NameToken {
            text: m.as_str().to_string(),
            start: folded.starts[m.start()],
            end: folded.ends[m.end() - 1],
        })
        .collect()
}

/// Returns only the word texts of [`tokenize`].
pub fn words(name: &str) -> Vec<String> {
    tokenize(name).into_iter().map(|token| token.text).collect()
}

/// Returns true when `word` is on the fixed stop-word list.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// ASCII-folded copy of a name with a byte map back to the original.
struct FoldedName {
    text: String,
    starts: Vec<usize>,
    ends: Vec<usize>,
}

impl FoldedName {
    fn new(name: &str) -> Self {
        let mut folded = FoldedName {
            text: String::with_capacity(name.len()),
            starts: Vec::with_capacity(name.len()),
            ends: Vec::with_capacity(name.len()),
        };
        for (offset, ch) in name.char_indices() {
            let end = offset + ch.len_utf8();
            if let Some(replacement) = unsplittable_letter(ch) {
                for r in replacement.chars() {
                    folded.push(r, offset, end);
                }
                continue;
            }
            // Compatibility forms (ligatures, full-width letters) fold too.
            for decomposed in ch.nfkd() {
                if matches!(decomposed, '\'' | '`')
                    || decomposed.general_category_group() == GeneralCategoryGroup::Mark
                {
                    continue;
                }
                for lower in decomposed.to_lowercase() {
                    let out = if lower.is_ascii() { lower } else { ' ' };
                    folded.push(out, offset, end);
                }
            }
        }
        folded
    }

    fn push(&mut self, ch: char, start: usize, end: usize) {
        debug_assert!(ch.is_ascii());
        self.text.push(ch);
        self.starts.push(start);
        self.ends.push(end);
    }
}

/// Latin letters with no decomposition to ASCII.
fn unsplittable_letter(ch: char) -> Option<&'static str> {
    let replacement = match ch {
        'ø' | 'Ø' => "o",
        'æ' | 'Æ' => "ae",
        'œ' | 'Œ' => "oe",
        'ß' => "ss",
        'đ' | 'Đ' | 'ð' | 'Ð' => "d",
        'ł' | 'Ł' => "l",
        'þ' | 'Þ' => "th",
        'ı' => "i",
        _ => return None,
    };
    Some(replacement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_words_are_sorted_for_binary_search() {
        let mut sorted = STOP_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOP_WORDS);
    }

    #[test]
    fn drops_short_words_and_stop_words() {
        assert_eq!(
            words("The Mill on Pecan Creek near FM 12"),
            vec!["mill", "pecan", "creek"]
        );
    }

    #[test]
    fn strips_diacritics_and_quotes() {
        assert_eq!(words("Río Grande"), vec!["rio", "grande"]);
        assert_eq!(words("O'Brien's `Fork`"), vec!["obriens", "fork"]);
        assert_eq!(words("Søndre Ærø"), vec!["sondre", "aero"]);
    }

    #[test]
    fn folds_compatibility_forms() {
        let name = "ﬁeld Ｍill Ｏ＇Neal";
        assert_eq!(words(name), vec!["field", "mill", "oneal"]);
        let tokens = tokenize(name);
        assert_eq!(&name[tokens[0].start..tokens[0].end], "ﬁeld");
        assert_eq!(&name[tokens[1].start..tokens[1].end], "Ｍill");
    }

    #[test]
    fn keeps_digit_runs() {
        assert_eq!(words("Highway 290, mile 12a"), vec!["highway", "290", "mile", "12a"]);
    }

    #[test]
    fn token_offsets_point_into_original_name() {
        let name = "Zilker Preserve";
        let tokens = tokenize(name);
        assert_eq!(tokens.len(), 2);
        assert_eq!((tokens[0].start, tokens[0].end), (0, 6));
        assert_eq!(&name[tokens[1].start..tokens[1].end], "Preserve");
    }

    #[test]
    fn token_offsets_span_multibyte_characters() {
        let name = "Cañón del Río";
        let tokens = tokenize(name);
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["canon", "del", "rio"]);
        assert_eq!(&name[tokens[0].start..tokens[0].end], "Cañón");
        assert_eq!(&name[tokens[2].start..tokens[2].end], "Río");
    }

    #[test]
    fn empty_when_nothing_qualifies() {
        assert!(tokenize("of a to").is_empty());
        assert!(tokenize("").is_empty());
    }
}
