//! Alert marker and escape-sequence sanitization for plain-text consumers

use std::sync::LazyLock;

use regex::Regex;

/// Reserved token a caller embeds in a raw line to request highlighting.
///
/// This is the SGR "red foreground" escape, so a marked line also renders red
/// when printed to a terminal before sanitization. Any SGR sequence that sets
/// red foreground counts, including compound ones such as `\x1b[1;31m`.
pub const ALERT_MARKER: &str = "\x1b[31m";

const RED_FOREGROUND: &str = "31";

static SGR_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[([0-9;]*)m").expect("SGR pattern is valid"));

/// Whether a raw line carries the alert marker
pub fn is_marked(raw: &str) -> bool {
    SGR_SEQUENCE
        .captures_iter(raw)
        .any(|caps| sets_red_foreground(&caps[1]))
}

/// Walk an SGR parameter list, skipping the arguments of extended colors
/// (`38;5;n`, `48;2;r;g;b` ...) so a palette index of 31 is not a match
fn sets_red_foreground(params: &str) -> bool {
    let mut params = params.split(';');
    while let Some(param) = params.next() {
        match param {
            RED_FOREGROUND => return true,
            "38" | "48" | "58" => {
                match params.next() {
                    Some("5") => {
                        params.next();
                    }
                    Some("2") => {
                        params.nth(2);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
    false
}

/// Remove every SGR escape sequence (colors, bold, reset) from `raw`
pub fn strip_escapes(raw: &str) -> String {
    SGR_SEQUENCE.replace_all(raw, "").into_owned()
}
