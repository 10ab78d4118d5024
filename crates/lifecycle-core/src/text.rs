//! Text normalization shared by the audit pipeline and the chat router.

use std::collections::BTreeSet;

const STOPWORDS: &[&str] = &[
    // es
    "a", "al", "con", "de", "del", "el", "en", "la", "las", "lo", "los", "mas", "mi", "para",
    "por", "que", "se", "su", "sus", "tu", "tus", "un", "una", "unos", "unas", "y", "o",
    // en
    "an", "and", "for", "in", "of", "on", "or", "the", "to", "your", "with",
];

/// Lowercase Latin-1 letters and common Latin Extended-A vowels.
fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'é' | 'è' | 'ë' | 'ê' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'í' | 'ì' | 'ï' | 'î' | 'ī' | 'į' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' | 'ø' | 'ō' | 'ő' => 'o',
        'ú' | 'ù' | 'ü' | 'û' | 'ū' | 'ů' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ñ' | 'ń' | 'ň' => 'n',
        'ç' | 'ć' | 'č' => 'c',
        'ś' | 'š' => 's',
        'ź' | 'ż' | 'ž' => 'z',
        'ł' => 'l',
        'ř' => 'r',
        'ď' => 'd',
        'ť' => 't',
        other => other,
    }
}

/// Lowercase, fold accents, strip punctuation and collapse whitespace.
pub fn fold(s: &str) -> String {
    let cleaned: String = s
        .to_lowercase()
        .chars()
        .map(fold_char)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `fold` with stopwords removed. Used as the comparison key for titles.
pub fn normalize(s: &str) -> String {
    fold(s)
        .split(' ')
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn tokens(s: &str) -> BTreeSet<String> {
    normalize(s).split(' ').filter(|w| !w.is_empty()).map(str::to_string).collect()
}

/// Similarity in `0.0..=1.0`: the larger of edit-distance similarity on the
/// normalized strings and token-set overlap.
pub fn similarity(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    let edit = strsim::normalized_levenshtein(&na, &nb);

    let ta = tokens(a);
    let tb = tokens(b);
    let shared = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    let overlap = if union == 0.0 { 0.0 } else { shared / union };

    edit.max(overlap)
}

/// True if the folded `needle` appears in the folded `haystack` on word boundaries.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let needle = fold(needle);
    if needle.is_empty() {
        return false;
    }
    let haystack = format!(" {} ", fold(haystack));
    haystack.contains(&format!(" {needle} "))
}
