//! URL slugs for generated page paths.

use deunicode::deunicode;

/// Lowercase ASCII slug: transliterate, keep alphanumerics, collapse
/// everything else into single dashes.
///
/// Empty input (or input with nothing sluggable) yields `"-"` so the
/// result is always a usable path segment.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in deunicode(text).chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push('-');
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_ascii() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rust & WebAssembly!  "), "rust-webassembly");
        assert_eq!(slugify("c++"), "c");
    }

    #[test]
    fn test_slugify_unicode() {
        assert_eq!(slugify("Café Crème"), "cafe-creme");
        assert_eq!(slugify("你好"), "ni-hao");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "-");
        assert_eq!(slugify("!!!"), "-");
    }
}
