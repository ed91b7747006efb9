/// English word helpers behind the default transforms.

/// Nouns whose plural is not formed by a suffix rule.
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("child", "children"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("louse", "lice"),
    ("man", "men"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    ("person", "people"),
    ("tooth", "teeth"),
    ("woman", "women"),
    ("calf", "calves"),
    ("half", "halves"),
    ("knife", "knives"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("loaf", "loaves"),
    ("shelf", "shelves"),
    ("thief", "thieves"),
    ("wife", "wives"),
    ("wolf", "wolves"),
    ("echo", "echoes"),
    ("hero", "heroes"),
    ("potato", "potatoes"),
    ("tomato", "tomatoes"),
    ("cactus", "cacti"),
    ("fungus", "fungi"),
    ("criterion", "criteria"),
    ("phenomenon", "phenomena"),
];

/// Nouns with identical singular and plural forms.
const INVARIANT_PLURALS: &[&str] = &[
    "deer", "fish", "sheep", "series", "species", "moose", "aircraft", "news", "feedback",
];

/// Words starting with a vowel letter but a consonant sound.
const CONSONANT_SOUND_PREFIXES: &[&str] = &["uni", "use", "usu", "uti", "eu", "one", "once", "ewe"];

/// Words starting with a silent `h`.
const SILENT_H_PREFIXES: &[&str] = &["hour", "honest", "honor", "honour", "heir"];

/// Upper-case the first character, leaving the rest untouched.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Pluralize a single English noun, keeping the casing of its first letter.
pub fn pluralize_word(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();

    if INVARIANT_PLURALS.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR_PLURALS.iter().find(|(s, _)| *s == lower) {
        return match_case(word, plural);
    }

    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{}es", word)
    } else if lower.ends_with('y') && !ends_with_vowel_y(&lower) {
        format!("{}ies", &word[..word.len() - 1])
    } else {
        format!("{}s", word)
    }
}

/// Pluralize the last word of a phrase: `bad feeling` → `bad feelings`.
pub fn pluralize(phrase: &str) -> String {
    let trimmed = phrase.trim();
    match trimmed.rfind(' ') {
        Some(idx) => format!("{} {}", &trimmed[..idx], pluralize_word(&trimmed[idx + 1..])),
        None => pluralize_word(trimmed),
    }
}

/// Prefix a phrase with `a` or `an` by the sound of its first word.
pub fn articlize(phrase: &str) -> String {
    let trimmed = phrase.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let article = if starts_with_vowel_sound(trimmed) { "an" } else { "a" };
    format!("{} {}", article, trimmed)
}

fn starts_with_vowel_sound(phrase: &str) -> bool {
    let lower = phrase.to_lowercase();
    if SILENT_H_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return true;
    }
    if CONSONANT_SOUND_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return false;
    }
    matches!(lower.chars().next(), Some('a' | 'e' | 'i' | 'o' | 'u'))
}

fn ends_with_vowel_y(lower: &str) -> bool {
    let mut rev = lower.chars().rev();
    rev.next();
    matches!(rev.next(), Some('a' | 'e' | 'i' | 'o' | 'u'))
}

fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().next().is_some_and(char::is_uppercase) {
        capitalize(replacement)
    } else {
        replacement.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_first_only() {
        assert_eq!(capitalize("junior"), "Junior");
        assert_eq!(capitalize("éclair time"), "Éclair time");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn regular_plurals() {
        assert_eq!(pluralize_word("dog"), "dogs");
        assert_eq!(pluralize_word("box"), "boxes");
        assert_eq!(pluralize_word("church"), "churches");
        assert_eq!(pluralize_word("city"), "cities");
        assert_eq!(pluralize_word("day"), "days");
    }

    #[test]
    fn irregular_plurals_keep_case() {
        assert_eq!(pluralize_word("mouse"), "mice");
        assert_eq!(pluralize_word("Mouse"), "Mice");
        assert_eq!(pluralize_word("sheep"), "sheep");
    }

    #[test]
    fn pluralize_last_word_of_phrase() {
        assert_eq!(pluralize(" bad feeling "), "bad feelings");
        assert_eq!(pluralize("mouse"), "mice");
    }

    #[test]
    fn articles() {
        assert_eq!(articlize("apple"), "an apple");
        assert_eq!(articlize("dog"), "a dog");
        assert_eq!(articlize("hour"), "an hour");
        assert_eq!(articlize("unicorn"), "a unicorn");
    }
}
