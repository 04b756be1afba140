use crate::models::split_extension;

pub const MAX_NAME_LEN: usize = 255;

const FORBIDDEN: &[char] = &['"', '*', ':', '<', '>', '?', '|', '/', '\\'];

const RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turns any string into a name that every mainstream filesystem accepts.
///
/// The steps run in a fixed order and each one sees the output of the
/// previous: truncate to [`MAX_NAME_LEN`] characters keeping the extension,
/// replace forbidden characters with `_`, replace blank names with
/// `unnamed`, drop leading dots, then suffix reserved device names with
/// `_renamed`.
pub fn sanitize(name: &str) -> String {
    let mut name = truncate(name);

    name = name
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();

    if name.trim().is_empty() {
        name = "unnamed".to_string();
    }

    let stripped = name.trim_start_matches('.');
    if stripped.is_empty() {
        name = "unnamed".to_string();
    } else if stripped.len() != name.len() {
        name = stripped.to_string();
    }

    if is_reserved_name(&name) {
        name.push_str("_renamed");
    }

    name
}

/// True when the stem, ignoring case and extension, is a Windows device name.
pub fn is_reserved_name(name: &str) -> bool {
    let (stem, _) = split_extension(name);
    let upper = stem.to_uppercase();
    RESERVED.contains(&upper.as_str())
}

fn truncate(name: &str) -> String {
    let total = name.chars().count();
    if total <= MAX_NAME_LEN {
        return name.to_string();
    }

    let (stem, ext) = split_extension(name);
    let ext_len = ext.map(|e| e.chars().count() + 1).unwrap_or(0);
    if ext_len >= MAX_NAME_LEN {
        // An extension this long cannot be kept.
        return name.chars().take(MAX_NAME_LEN).collect();
    }

    let mut out: String = stem.chars().take(MAX_NAME_LEN - ext_len).collect();
    if let Some(ext) = ext {
        out.push('.');
        out.push_str(ext);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_and_dot_names() {
        assert_eq!(sanitize(""), "unnamed");
        assert_eq!(sanitize("   "), "unnamed");
        assert_eq!(sanitize("..."), "unnamed");
        assert_eq!(sanitize(".hidden"), "hidden");
        assert_eq!(sanitize("..config.toml"), "config.toml");
    }

    #[test]
    fn test_forbidden_characters() {
        assert_eq!(sanitize("a\"b*c"), "a_b_c");
        assert_eq!(sanitize("what?<now>|ok:dir/file\\x.txt"), "what__now__ok_dir_file_x.txt");
    }

    #[test]
    fn test_reserved_names() {
        assert_eq!(sanitize("CON"), "CON_renamed");
        assert_eq!(sanitize("con.txt"), "con.txt_renamed");
        assert_eq!(sanitize("Lpt9.tar.gz"), "Lpt9.tar.gz");
        assert_eq!(sanitize("lpt9.gz"), "lpt9.gz_renamed");
        assert_eq!(sanitize("COM10"), "COM10");
        assert_eq!(sanitize("console.log"), "console.log");
    }

    #[test]
    fn test_reserved_after_dot_strip() {
        assert_eq!(sanitize(".nul"), "nul_renamed");
    }

    #[test]
    fn test_truncates_and_keeps_extension() {
        let long = format!("{}.jpeg", "x".repeat(400));
        let out = sanitize(&long);
        assert_eq!(out.chars().count(), MAX_NAME_LEN);
        assert!(out.ends_with(".jpeg"));
    }

    #[test]
    fn test_truncates_on_char_boundaries() {
        let long = format!("{}.txt", "\u{e9}".repeat(300));
        let out = sanitize(&long);
        assert_eq!(out.chars().count(), MAX_NAME_LEN);
        assert!(out.ends_with(".txt"));
    }

    #[test]
    fn test_short_names_untouched() {
        assert_eq!(sanitize("holiday photo (1).jpg"), "holiday photo (1).jpg");
    }
}
