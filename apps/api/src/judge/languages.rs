//! The one language table shared by the realtime and REST paths.

use crate::errors::CoreError;
use crate::judge::LanguageInfo;

/// Judge0 language ids.
const LANGUAGES: &[(&str, u32)] = &[
    ("python", 71),
    ("javascript", 63),
    ("java", 62),
    ("cpp", 54),
    ("c", 50),
    ("go", 60),
    ("rust", 73),
    ("typescript", 74),
];

/// Case-insensitive lookup of a judge language id.
pub fn language_id(name: &str) -> Option<u32> {
    let name = name.trim();
    LANGUAGES
        .iter()
        .find(|(lang, _)| lang.eq_ignore_ascii_case(name))
        .map(|(_, id)| *id)
}

pub fn resolve(name: &str) -> Result<u32, CoreError> {
    language_id(name).ok_or_else(|| CoreError::UnsupportedLanguage {
        language: name.to_string(),
        supported: supported_names().join(", "),
    })
}

pub fn supported_names() -> Vec<&'static str> {
    LANGUAGES.iter().map(|(lang, _)| *lang).collect()
}

pub fn supported() -> Vec<LanguageInfo> {
    LANGUAGES
        .iter()
        .map(|(name, id)| LanguageInfo {
            id: *id,
            name: name.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(language_id("Python"), Some(71));
        assert_eq!(language_id("RUST"), Some(73));
        assert_eq!(language_id("typescript"), Some(74));
    }

    #[test]
    fn test_unmapped_language_error_lists_supported() {
        let err = resolve("cobol").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("cobol"));
        assert!(text.contains("python"));
        assert!(text.contains("go"));
    }
}
