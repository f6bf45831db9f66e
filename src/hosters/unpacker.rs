//! Unpacker for `eval(function(p,a,c,k,e,d){...})` packed player scripts.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref PACKED_ARGS: Regex = Regex::new(
        r"(?s)\}\s*\(\s*'(.*)',\s*(\d+),\s*(\d+),\s*'(.*?)'\.split\('\|'\)"
    )
    .unwrap();
    static ref WORD: Regex = Regex::new(r"\b\w+\b").unwrap();
}

const ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Index of `word` written in base `radix` (up to 62).
fn decode_word(word: &str, radix: usize) -> Option<usize> {
    if radix == 0 || radix > ALPHABET.len() {
        return None;
    }
    let mut value: usize = 0;
    for c in word.chars() {
        let digit = ALPHABET[..radix].find(c)?;
        value = value.checked_mul(radix)?.checked_add(digit)?;
    }
    Some(value)
}

pub fn is_packed(script: &str) -> bool {
    script.contains("eval(function(p,a,c,k,e,")
}

/// Unpack the first packed script found in `text`.
pub fn unpack(text: &str) -> Option<String> {
    let start = text.find("eval(function(p,a,c,k,e,")?;
    let caps = PACKED_ARGS.captures(&text[start..])?;

    let payload = caps.get(1)?.as_str().replace("\\'", "'");
    let radix: usize = caps.get(2)?.as_str().parse().ok()?;
    let count: usize = caps.get(3)?.as_str().parse().ok()?;
    let symbols: Vec<&str> = caps.get(4)?.as_str().split('|').collect();

    if symbols.len() < count {
        log::debug!("Packed script declares {} symbols, found {}", count, symbols.len());
    }

    let unpacked = WORD.replace_all(&payload, |word: &Captures| {
        let token = &word[0];
        match decode_word(token, radix).and_then(|i| symbols.get(i)) {
            Some(symbol) if !symbol.is_empty() => symbol.to_string(),
            _ => token.to_string(),
        }
    });

    Some(unpacked.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_mdcore_script() {
        let packed = r#"<script>eval(function(p,a,c,k,e,d){e=function(c){return c};if(!''.replace(/^/,String)){while(c--){d[c]=k[c]||c}k=[function(e){return d[e]}];e=function(){return'\\w+'};c=1};while(c--){if(k[c]){p=p.replace(new RegExp('\\b'+e(c)+'\\b','g'),k[c])}}return p}('0.1="//2.3/4.5";0.6=\'7\';',10,8,'MDCore|wurl|a-delivery|mxcontent|v|mp4|ref|abc'.split('|'),0,{}))</script>"#;
        let unpacked = unpack(packed).unwrap();
        assert_eq!(unpacked, r#"MDCore.wurl="//a-delivery.mxcontent/v.mp4";MDCore.ref='abc';"#);
    }

    #[test]
    fn test_base36_words() {
        assert_eq!(decode_word("a", 36), Some(10));
        assert_eq!(decode_word("10", 36), Some(36));
        assert_eq!(decode_word("Z", 62), Some(61));
        assert_eq!(decode_word("Z", 36), None);
    }

    #[test]
    fn test_not_packed() {
        assert!(!is_packed("var player = jwplayer();"));
        assert_eq!(unpack("var player = jwplayer();"), None);
    }
}
