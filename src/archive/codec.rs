//! Decoding of the 8-bit Western encodings the regulators publish in.

/// Windows-1252 code points for bytes 0x80..=0x9F. Undefined slots map to
/// the C1 control of the same value, matching the WHATWG decoder.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// ISO-8859-1; call report bulk files.
    Latin1,
    /// Windows-1252; UBPR bulk files.
    Windows1252,
}

impl TextEncoding {
    /// Decode `bytes` into UTF-8. Every byte maps to exactly one char, so this never fails.
    pub fn decode(self, bytes: &[u8]) -> String {
        if bytes.is_ascii() {
            return String::from_utf8_lossy(bytes).into_owned();
        }
        let mut out = String::with_capacity(bytes.len() + bytes.len() / 8);
        match self {
            TextEncoding::Latin1 => out.extend(bytes.iter().map(|&b| b as char)),
            TextEncoding::Windows1252 => out.extend(bytes.iter().map(|&b| match b {
                0x80..=0x9F => CP1252_HIGH[(b - 0x80) as usize],
                _ => b as char,
            })),
        }
        out
    }
}
