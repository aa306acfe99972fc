//! XML Character Classification
//!
//! Constant lookup tables for the most common characters, with range checks
//! for everything above the tables:
//! - Name characters: table for U+0000..=U+00FF, Name production ranges above
//! - Public identifier characters: table for 7-bit ASCII only
//! - Char production (XML 1.0 / 1.1)

use crate::config::XmlVersion;

/// Character can not appear in a name
const NAME_INVALID: u8 = 0;
/// Character can start or continue a name
const NAME_ALL_VALID: u8 = 1;
/// Character can continue a name but not start one
const NAME_VALID_NONFIRST: u8 = 2;

/// Name validity for the first 256 code points
static NAME_CHARS: [u8; 256] = build_name_table();

/// Public identifier validity for 7-bit ASCII
static PUBID_CHARS: [bool; 128] = build_pubid_table();

const fn build_name_table() -> [u8; 256] {
    let mut table = [NAME_INVALID; 256];

    table[b'_' as usize] = NAME_ALL_VALID;
    let mut i = 0;
    while i < 26 {
        table[b'A' as usize + i] = NAME_ALL_VALID;
        table[b'a' as usize + i] = NAME_ALL_VALID;
        i += 1;
    }
    // Latin-1 letters; multiplication and division signs are not
    let mut i = 0xC0;
    while i <= 0xFF {
        table[i] = NAME_ALL_VALID;
        i += 1;
    }
    table[0xD7] = NAME_INVALID;
    table[0xF7] = NAME_INVALID;

    table[b'-' as usize] = NAME_VALID_NONFIRST;
    table[b'.' as usize] = NAME_VALID_NONFIRST;
    table[0xB7] = NAME_VALID_NONFIRST;
    let mut i = 0;
    while i < 10 {
        table[b'0' as usize + i] = NAME_VALID_NONFIRST;
        i += 1;
    }
    table
}

const fn build_pubid_table() -> [bool; 128] {
    let mut table = [false; 128];
    let mut i = 0;
    while i < 26 {
        table[b'A' as usize + i] = true;
        table[b'a' as usize + i] = true;
        i += 1;
    }
    let mut i = 0;
    while i < 10 {
        table[b'0' as usize + i] = true;
        i += 1;
    }
    table[0x0A] = true;
    table[0x0D] = true;
    table[0x20] = true;

    let punct = b"-'()+,./:=?;!*#@$_%";
    let mut i = 0;
    while i < punct.len() {
        table[punct[i] as usize] = true;
        i += 1;
    }
    table
}

/// Check if a character can start a name (colon excluded)
#[inline]
pub fn is_name_start_char(c: char) -> bool {
    let cp = c as u32;
    if cp < 0x100 {
        return NAME_CHARS[cp as usize] == NAME_ALL_VALID;
    }
    is_wide_name_start_char(cp)
}

/// Check if a character can continue a name (colon excluded)
#[inline]
pub fn is_name_char(c: char) -> bool {
    let cp = c as u32;
    if cp < 0x100 {
        return NAME_CHARS[cp as usize] != NAME_INVALID;
    }
    is_wide_name_start_char(cp) || matches!(cp, 0x0300..=0x036F | 0x203F..=0x2040)
}

/// Check if a character is legal inside a public identifier literal
#[inline]
pub fn is_pubid_char(c: char) -> bool {
    let cp = c as u32;
    cp < 0x80 && PUBID_CHARS[cp as usize]
}

/// NameStartChar ranges above U+00FF (XML 1.0 fifth edition / XML 1.1)
#[inline]
fn is_wide_name_start_char(cp: u32) -> bool {
    matches!(cp,
        0x0100..=0x02FF |
        0x0370..=0x037D |
        0x037F..=0x1FFF |
        0x200C..=0x200D |
        0x2070..=0x218F |
        0x2C00..=0x2FEF |
        0x3001..=0xD7FF |
        0xF900..=0xFDCF |
        0xFDF0..=0xFFFD |
        0x10000..=0xEFFFF
    )
}

/// Check if a code point is a valid XML Char for the given version
///
/// XML 1.0: #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
/// XML 1.1 additionally allows [#x1-#x1F] (only via character references in content)
#[inline]
pub fn is_xml_char(cp: u32, version: XmlVersion) -> bool {
    match cp {
        0x9 | 0xA | 0xD => true,
        0x1..=0x1F => version == XmlVersion::V1_1,
        0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF => true,
        _ => false,
    }
}

/// Human readable description of a character for error messages
pub fn char_desc(c: char) -> String {
    let cp = c as u32;
    if c.is_control() {
        format!("(CTRL-CHAR, code {cp})")
    } else if cp > 0xFF {
        format!("'{c}' (code {cp} / 0x{cp:x})")
    } else {
        format!("'{c}' (code {cp})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_name_chars() {
        assert!(is_name_start_char('a'));
        assert!(is_name_start_char('Z'));
        assert!(is_name_start_char('_'));
        assert!(!is_name_start_char(':'));
        assert!(!is_name_start_char('1'));
        assert!(!is_name_start_char('-'));
        assert!(is_name_char('1'));
        assert!(is_name_char('-'));
        assert!(is_name_char('.'));
        assert!(!is_name_char(':'));
        assert!(!is_name_char(' '));
        assert!(!is_name_char('='));
    }

    #[test]
    fn test_latin1_name_chars() {
        assert!(is_name_start_char('\u{C0}'));
        assert!(is_name_start_char('\u{F6}'));
        assert!(!is_name_start_char('\u{D7}'));
        assert!(!is_name_char('\u{F7}'));
        assert!(!is_name_start_char('\u{B7}'));
        assert!(is_name_char('\u{B7}'));
    }

    #[test]
    fn test_wide_name_chars() {
        assert!(is_name_start_char('\u{4E2D}'));
        assert!(is_name_start_char('\u{10000}'));
        assert!(!is_name_start_char('\u{0300}'));
        assert!(is_name_char('\u{0300}'));
        assert!(is_name_char('\u{203F}'));
        assert!(!is_name_char('\u{FFFE}'));
        assert!(!is_name_char('\u{FFFF}'));
        assert!(!is_name_char('\u{F0000}'));
    }

    #[test]
    fn test_pubid_chars() {
        for c in "azAZ09 \r\n-'()+,./:=?;!*#@$_%".chars() {
            assert!(is_pubid_char(c), "{c:?} should be valid");
        }
        for c in "\"<>&\t[]{}~\u{E9}".chars() {
            assert!(!is_pubid_char(c), "{c:?} should be invalid");
        }
    }

    #[test]
    fn test_xml_char_versions() {
        assert!(is_xml_char(0x9, XmlVersion::V1_0));
        assert!(!is_xml_char(0x1, XmlVersion::V1_0));
        assert!(is_xml_char(0x1, XmlVersion::V1_1));
        assert!(!is_xml_char(0x0, XmlVersion::V1_1));
        assert!(!is_xml_char(0xD800, XmlVersion::V1_0));
        assert!(!is_xml_char(0xFFFE, XmlVersion::V1_0));
        assert!(is_xml_char(0x10FFFF, XmlVersion::V1_0));
        assert!(!is_xml_char(0x110000, XmlVersion::V1_0));
    }

    #[test]
    fn test_char_desc() {
        assert_eq!(char_desc('a'), "'a' (code 97)");
        assert_eq!(char_desc('\u{1}'), "(CTRL-CHAR, code 1)");
        assert_eq!(char_desc('\u{4E2D}'), "'\u{4E2D}' (code 20013 / 0x4e2d)");
    }
}
