use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

static DECLARED_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"Content-Type:[^"]*charset\s*=\s*([A-Za-z0-9_.:-]+)"#)
        .expect("charset pattern")
});

/// Decoded catalog text plus the encoding it must be written back in.
#[derive(Debug)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static Encoding,
}

/// Decodes raw catalog bytes.
///
/// Order: UTF-8 BOM, the charset declared in the header, valid UTF-8, then a
/// statistical guess for legacy files without a usable declaration.
pub fn decode_catalog(bytes: &[u8]) -> Result<Decoded, String> {
    // BOM UTF-8 (EF BB BF)
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return decode_with(rest, UTF_8);
    }

    if let Some(encoding) = declared_encoding(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(Decoded {
            text: text.to_string(),
            encoding: UTF_8,
        });
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, true);

    tracing::debug!(encoding = guess.name(), "catalog charset guessed");

    decode_with(bytes, guess)
}

/// Encodes catalog text for writing. Characters the target charset cannot
/// represent become numeric character references, which is what encoding_rs
/// does for legacy encoders.
pub fn encode_catalog(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    let (bytes, _, _) = encoding.output_encoding().encode(text);
    bytes.into_owned()
}

fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let caps = DECLARED_CHARSET.captures(bytes)?;
    let label = caps.get(1)?.as_bytes();

    // "CHARSET" is the placeholder xgettext leaves in fresh templates.
    if label.eq_ignore_ascii_case(b"charset") {
        return None;
    }

    Encoding::for_label(label)
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<Decoded, String> {
    let (text, actual, had_errors) = encoding.decode(bytes);

    if had_errors {
        return Err(format!("invalid {} byte sequence", encoding.name()));
    }

    Ok(Decoded {
        text: text.into_owned(),
        encoding: actual,
    })
}
