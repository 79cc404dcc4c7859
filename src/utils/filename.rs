//! Filesystem-safe slug generation for output filenames

/// Maximum slug length. Windows caps paths at 255 chars, be conservative.
const MAX_SLUG_LEN: usize = 200;

/// Fold a Latin character with diacritics to its ASCII base letter.
/// Anything not covered (emoji, CJK, symbols) is dropped by the caller.
fn fold_diacritic(c: char) -> Option<char> {
    let folded = match c {
        'à'..='å' | 'À'..='Å' | 'ā' | 'ă' | 'ą' | 'ª' => 'a',
        'ç' | 'Ç' | 'ć' | 'č' => 'c',
        'è'..='ë' | 'È'..='Ë' | 'ē' | 'ė' | 'ę' => 'e',
        'ì'..='ï' | 'Ì'..='Ï' | 'ī' | 'į' => 'i',
        'ñ' | 'Ñ' | 'ń' => 'n',
        'ò'..='ö' | 'Ò'..='Ö' | 'ø' | 'Ø' | 'ō' | 'º' | '°' => 'o',
        'ù'..='ü' | 'Ù'..='Ü' | 'ū' => 'u',
        'ý' | 'ÿ' | 'Ý' => 'y',
        'š' | 'ś' => 's',
        'ž' | 'ź' | 'ż' => 'z',
        'ß' => 's',
        _ => return None,
    };
    Some(folded)
}

/// Convert a video title into a slug safe for any filesystem:
/// lower-case ASCII letters and digits, everything else collapsed to `_`.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_sep = true; // suppress leading separators

    for c in title.chars() {
        let c = if c.is_ascii() {
            c
        } else if let Some(folded) = fold_diacritic(c.to_lowercase().next().unwrap_or(c)) {
            folded
        } else {
            // Emoji and other non-Latin codepoints are dropped outright
            continue;
        };

        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            // Whitespace, punctuation and path separators all collapse to _
            out.push('_');
            last_was_sep = true;
        }
    }

    // Trim trailing separator left by punctuation at the end
    while out.ends_with('_') {
        out.pop();
    }

    if out.len() > MAX_SLUG_LEN {
        out.truncate(MAX_SLUG_LEN);
        while out.ends_with('_') {
            out.pop();
        }
    }

    if out.is_empty() {
        out.push_str("video");
    }

    out
}
