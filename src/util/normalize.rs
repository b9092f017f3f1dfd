/// Prepare a synopsis for embedding.
///
/// Lowercases, transliterates everything to its closest ASCII spelling
/// (accents dropped, other scripts romanized), then drops digits,
/// punctuation and symbols. What remains is lowercase ASCII letters and
/// whitespace. The transliteration tables are compiled in, so the result
/// does not depend on the host locale.
pub fn normalize(text: &str) -> String {
    // Characters without a transliteration are dropped.
    let ascii = deunicode::deunicode_with_tofu(&text.to_lowercase(), "");

    // Romanized scripts come back capitalized ("東京" -> "Dong Jing").
    ascii
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_ascii_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
