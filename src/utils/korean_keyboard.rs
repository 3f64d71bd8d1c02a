//! Transliterates Hangul into the keys typed on a 2-set (dubeolsik) keyboard,
//! so a Korean student name maps to a stable ASCII login id.

const SYLLABLE_BASE: u32 = 0xAC00;
const SYLLABLE_LAST: u32 = 0xD7A3;
const JUNGSEONG_COUNT: u32 = 21;
const JONGSEONG_COUNT: u32 = 28;

pub const STUDENT_LOGIN_DOMAIN: &str = "students.local";

const CHOSEONG: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ', 'ㅌ',
    'ㅍ', 'ㅎ',
];

const JUNGSEONG: [char; 21] = [
    'ㅏ', 'ㅐ', 'ㅑ', 'ㅒ', 'ㅓ', 'ㅔ', 'ㅕ', 'ㅖ', 'ㅗ', 'ㅘ', 'ㅙ', 'ㅚ', 'ㅛ', 'ㅜ', 'ㅝ', 'ㅞ', 'ㅟ',
    'ㅠ', 'ㅡ', 'ㅢ', 'ㅣ',
];

// Index 0 is "no final consonant".
const JONGSEONG: [Option<char>; 28] = [
    None,
    Some('ㄱ'),
    Some('ㄲ'),
    Some('ㄳ'),
    Some('ㄴ'),
    Some('ㄵ'),
    Some('ㄶ'),
    Some('ㄷ'),
    Some('ㄹ'),
    Some('ㄺ'),
    Some('ㄻ'),
    Some('ㄼ'),
    Some('ㄽ'),
    Some('ㄾ'),
    Some('ㄿ'),
    Some('ㅀ'),
    Some('ㅁ'),
    Some('ㅂ'),
    Some('ㅄ'),
    Some('ㅅ'),
    Some('ㅆ'),
    Some('ㅇ'),
    Some('ㅈ'),
    Some('ㅊ'),
    Some('ㅋ'),
    Some('ㅌ'),
    Some('ㅍ'),
    Some('ㅎ'),
];

/// Keys for a single compatibility jamo. Compound vowels and consonant
/// clusters are typed as two keys.
fn jamo_keys(jamo: char) -> Option<&'static str> {
    let keys = match jamo {
        'ㅂ' => "q",
        'ㅈ' => "w",
        'ㄷ' => "e",
        'ㄱ' => "r",
        'ㅅ' => "t",
        'ㅛ' => "y",
        'ㅕ' => "u",
        'ㅑ' => "i",
        'ㅐ' => "o",
        'ㅔ' => "p",
        'ㅁ' => "a",
        'ㄴ' => "s",
        'ㅇ' => "d",
        'ㄹ' => "f",
        'ㅎ' => "g",
        'ㅗ' => "h",
        'ㅓ' => "j",
        'ㅏ' => "k",
        'ㅣ' => "l",
        'ㅋ' => "z",
        'ㅌ' => "x",
        'ㅊ' => "c",
        'ㅍ' => "v",
        'ㅠ' => "b",
        'ㅜ' => "n",
        'ㅡ' => "m",
        'ㅃ' => "Q",
        'ㅉ' => "W",
        'ㄸ' => "E",
        'ㄲ' => "R",
        'ㅆ' => "T",
        'ㅒ' => "O",
        'ㅖ' => "P",
        'ㅘ' => "hk",
        'ㅙ' => "ho",
        'ㅚ' => "hl",
        'ㅝ' => "nj",
        'ㅞ' => "np",
        'ㅟ' => "nl",
        'ㅢ' => "ml",
        'ㄳ' => "rt",
        'ㄵ' => "sw",
        'ㄶ' => "sg",
        'ㄺ' => "fr",
        'ㄻ' => "fa",
        'ㄼ' => "fq",
        'ㄽ' => "ft",
        'ㄾ' => "fx",
        'ㄿ' => "fv",
        'ㅀ' => "fg",
        'ㅄ' => "qt",
        _ => return None,
    };
    Some(keys)
}

pub fn is_hangul_syllable(c: char) -> bool {
    (SYLLABLE_BASE..=SYLLABLE_LAST).contains(&(c as u32))
}

/// Converts Hangul syllables and jamo to keyboard keys. Digits pass through,
/// everything else is lowercased.
pub fn to_keyboard_keys(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);

    for c in input.chars() {
        if c.is_ascii_digit() {
            out.push(c);
        } else if is_hangul_syllable(c) {
            let offset = c as u32 - SYLLABLE_BASE;
            let jong = (offset % JONGSEONG_COUNT) as usize;
            let jung = ((offset / JONGSEONG_COUNT) % JUNGSEONG_COUNT) as usize;
            let cho = (offset / JONGSEONG_COUNT / JUNGSEONG_COUNT) as usize;

            out.extend(jamo_keys(CHOSEONG[cho]));
            out.extend(jamo_keys(JUNGSEONG[jung]));
            if let Some(final_consonant) = JONGSEONG[jong] {
                out.extend(jamo_keys(final_consonant));
            }
        } else if let Some(keys) = jamo_keys(c) {
            out.push_str(keys);
        } else {
            out.extend(c.to_lowercase());
        }
    }

    out
}

/// Login id for a student username: the keyboard transliteration for Hangul
/// names, the lowercased name otherwise.
pub fn student_login_id(username: &str) -> String {
    let trimmed = username.trim();
    let local = if trimmed.chars().any(is_hangul_syllable) {
        to_keyboard_keys(trimmed)
    } else {
        trimmed.to_lowercase()
    };
    format!("{}@{}", local, STUDENT_LOGIN_DOMAIN)
}
