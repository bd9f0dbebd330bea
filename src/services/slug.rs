//! Slug generation
//!
//! Titles on the site are mostly Russian, so slugs go through a Cyrillic to
//! Latin transliteration before being normalised into `[a-z0-9-]` form.
//! Other scripts are NFKD-decomposed and reduced to their ASCII part, so
//! `Café` becomes `cafe` and a title with no ASCII left yields an empty slug.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

/// Default length cap for [`generate_seo_friendly_slug`]
pub const SEO_SLUG_MAX_LENGTH: usize = 50;

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_\s-]").expect("valid regex"));
static SEPARATOR_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_\s]+").expect("valid regex"));

fn transliterate_char(c: char) -> Option<&'static str> {
    let latin = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' | 'Ъ' | 'Ь' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        'А' => "A",
        'Б' => "B",
        'В' => "V",
        'Г' => "G",
        'Д' => "D",
        'Е' => "E",
        'Ё' => "Yo",
        'Ж' => "Zh",
        'З' => "Z",
        'И' => "I",
        'Й' => "Y",
        'К' => "K",
        'Л' => "L",
        'М' => "M",
        'Н' => "N",
        'О' => "O",
        'П' => "P",
        'Р' => "R",
        'С' => "S",
        'Т' => "T",
        'У' => "U",
        'Ф' => "F",
        'Х' => "H",
        'Ц' => "Ts",
        'Ч' => "Ch",
        'Ш' => "Sh",
        'Щ' => "Sch",
        'Ы' => "Y",
        'Э' => "E",
        'Ю' => "Yu",
        'Я' => "Ya",
        _ => return None,
    };
    Some(latin)
}

/// Replace Russian letters with their Latin spelling; other characters pass through
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match transliterate_char(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

/// Transliterate and normalise `text` into a URL slug
///
/// ```ignore
/// assert_eq!(slugify("Привет, мир!"), "privet-mir");
/// ```
pub fn slugify(text: &str) -> String {
    let ascii: String = transliterate(text)
        .nfkd()
        .filter(char::is_ascii)
        .collect();
    let lowered = ascii.to_lowercase();
    let cleaned = NON_SLUG_CHARS.replace_all(&lowered, "");
    let joined = SEPARATOR_RUNS.replace_all(cleaned.trim(), "-");
    joined.trim_matches('-').to_string()
}

/// `{prefix}-{8 hex chars}`, used when a title yields no slug at all
pub fn random_slug(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

/// Build a slug from `text` that `exists` reports as free
///
/// `exists` is asked about each candidate in turn: the base slug, then
/// `base-1`, `base-2` and so on. Callers exclude the row being saved inside
/// the closure.
pub async fn generate_unique_slug<F, Fut>(prefix: &str, text: &str, mut exists: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut base = slugify(text);
    if base.is_empty() {
        base = random_slug(prefix);
    }

    let mut candidate = base.clone();
    let mut counter = 1u32;
    while exists(candidate.clone()).await? {
        candidate = format!("{}-{}", base, counter);
        counter += 1;
    }
    Ok(candidate)
}

/// ASCII letters, digits and single inner hyphens only
pub fn validate_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
}

/// Slug cut on a word boundary so that it fits in `max_length` characters
pub fn generate_seo_friendly_slug(title: &str, max_length: usize) -> String {
    let slug = slugify(title);
    if slug.chars().count() <= max_length {
        return slug;
    }

    let mut result = String::new();
    for word in slug.split('-') {
        let extra = if result.is_empty() { 0 } else { 1 };
        if result.chars().count() + extra + word.chars().count() > max_length {
            break;
        }
        if !result.is_empty() {
            result.push('-');
        }
        result.push_str(word);
    }

    if result.is_empty() {
        let cut: String = slug.chars().take(max_length).collect();
        cut.trim_end_matches('-').to_string()
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_transliterate() {
        assert_eq!(transliterate("Щука и ёж"), "Schuka i yozh");
        assert_eq!(transliterate("объявление"), "obyavlenie");
        assert_eq!(transliterate("NLP 2024"), "NLP 2024");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Привет, мир!"), "privet-mir");
        assert_eq!(slugify("  Машинное   обучение -- основы  "), "mashinnoe-obuchenie-osnovy");
        assert_eq!(slugify("BERT & GPT: a comparison"), "bert-gpt-a-comparison");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_other_scripts() {
        assert_eq!(slugify("Café crème"), "cafe-creme");
        assert_eq!(slugify("Straße à la Ñandú"), "strae-a-la-nandu");
        assert_eq!(slugify("深度学习"), "");
        assert_eq!(slugify("BERT 深度学习 notes"), "bert-notes");
        assert!(validate_slug(&slugify("Crème brûlée")));
    }

    #[test]
    fn test_slugify_underscores_become_hyphens() {
        let slug = slugify("snake_case title");
        assert_eq!(slug, "snake-case-title");
        assert!(validate_slug(&slug));
        assert_eq!(slugify("__init__"), "init");
    }

    #[tokio::test]
    async fn test_unique_slug_for_non_latin_title() {
        let slug = generate_unique_slug("post", "深度学习", |_| async { Ok(false) })
            .await
            .unwrap();
        assert!(slug.starts_with("post-"));
        assert!(validate_slug(&slug));
    }

    #[test]
    fn test_random_slug_shape() {
        let slug = random_slug("post");
        assert!(slug.starts_with("post-"));
        assert_eq!(slug.len(), "post-".len() + 8);
        assert!(validate_slug(&slug));
    }

    #[tokio::test]
    async fn test_unique_slug_appends_counter() {
        let taken: HashSet<String> = ["nlp".to_string(), "nlp-1".to_string()].into();
        let slug = generate_unique_slug("post", "NLP", |candidate| {
            let hit = taken.contains(&candidate);
            async move { Ok(hit) }
        })
        .await
        .unwrap();
        assert_eq!(slug, "nlp-2");
    }

    #[tokio::test]
    async fn test_unique_slug_falls_back_to_random() {
        let slug = generate_unique_slug("file", "???", |_| async { Ok(false) })
            .await
            .unwrap();
        assert!(slug.starts_with("file-"));
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("privet-mir"));
        assert!(validate_slug("NLP-2024"));
        assert!(!validate_slug(""));
        assert!(!validate_slug("-start"));
        assert!(!validate_slug("end-"));
        assert!(!validate_slug("double--dash"));
        assert!(!validate_slug("snake_case"));
        assert!(!validate_slug("привет"));
    }

    #[test]
    fn test_seo_slug_cuts_on_words() {
        let slug = generate_seo_friendly_slug(
            "Обработка естественного языка с помощью трансформеров",
            30,
        );
        assert!(slug.chars().count() <= 30);
        assert!(!slug.ends_with('-'));
        assert_eq!(slug, "obrabotka-estestvennogo-yazyka");

        assert_eq!(generate_seo_friendly_slug("Short", SEO_SLUG_MAX_LENGTH), "short");
        assert_eq!(generate_seo_friendly_slug("abcdefghij", 4), "abcd");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            /// Slugs of Latin/Cyrillic text never carry edge or doubled hyphens
            #[test]
            fn slugify_output_is_valid(text in "[a-zA-Zа-яА-Я0-9 ,.!-]{1,40}") {
                let slug = slugify(&text);
                prop_assume!(!slug.is_empty());
                prop_assert!(validate_slug(&slug));
            }

            /// Any title, in any script, slugs to empty or to a valid slug
            #[test]
            fn slugify_any_text_is_empty_or_valid(text in "\\PC{0,40}") {
                let slug = slugify(&text);
                prop_assert!(slug.is_empty() || validate_slug(&slug));
            }

            #[test]
            fn seo_slug_respects_max_length(text in "[a-z ]{1,80}", max in 5usize..40) {
                let slug = generate_seo_friendly_slug(&text, max);
                prop_assert!(slug.chars().count() <= max);
            }
        }
    }
}
