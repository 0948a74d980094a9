//! User agent parsing into browser/OS/device/engine facets

use woothee::parser::Parser;

use crate::analytics::models::ClientSignature;

const UNKNOWN: &str = "UNKNOWN";

/// Parses a raw user agent string into structured facets.
///
/// Returns `None` when the string cannot be parsed at all; callers record
/// empty facets in that case.
pub trait SignatureParser: Send + Sync {
    fn parse(&self, raw: &str) -> Option<ClientSignature>;
}

/// [`SignatureParser`] backed by the woothee rule set
#[derive(Debug, Clone, Copy, Default)]
pub struct WootheeParser;

impl WootheeParser {
    pub fn new() -> Self {
        Self
    }
}

fn known(value: &str) -> Option<String> {
    if value.is_empty() || value == UNKNOWN {
        None
    } else {
        Some(value.to_string())
    }
}

impl SignatureParser for WootheeParser {
    fn parse(&self, raw: &str) -> Option<ClientSignature> {
        if raw.trim().is_empty() {
            return None;
        }

        let parser = Parser::new();
        let result = parser.parse(raw)?;

        let os_name = known(result.os);
        let (device_vendor, device_model) = apple_device(os_name.as_deref());
        let (engine_name, engine_version) = detect_engine(raw);

        Some(ClientSignature {
            browser_name: known(result.name),
            browser_version: known(result.version),
            os_name,
            os_version: known(&result.os_version),
            device_type: device_type(result.category, result.os, raw),
            device_vendor,
            device_model,
            engine_name,
            engine_version,
        })
    }
}

/// Desktop ("pc") is left absent so the read-time default applies.
fn device_type(category: &str, os: &str, raw: &str) -> Option<String> {
    let device = match category {
        "smartphone" if os == "iPad" => "tablet",
        "smartphone" if os == "Android" && !raw.contains("Mobile") => "tablet",
        "smartphone" | "mobilephone" => "mobile",
        "appliance" => "appliance",
        "crawler" => "crawler",
        _ => return None,
    };
    Some(device.to_string())
}

fn apple_device(os: Option<&str>) -> (Option<String>, Option<String>) {
    match os {
        Some(model @ ("iPhone" | "iPad" | "iPod")) => {
            (Some("Apple".to_string()), Some(model.to_string()))
        }
        Some("Mac OSX") => (Some("Apple".to_string()), Some("Macintosh".to_string())),
        _ => (None, None),
    }
}

/// Version text following `token`, up to the next separator
fn token_version(raw: &str, token: &str) -> Option<String> {
    let start = raw.find(token)? + token.len();
    let version: String = raw[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != ';' && *c != ')')
        .collect();

    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}

fn detect_engine(raw: &str) -> (Option<String>, Option<String>) {
    let engine = |name: &str, version: Option<String>| (Some(name.to_string()), version);

    if raw.contains("Trident/") {
        return engine("Trident", token_version(raw, "Trident/"));
    }
    if raw.contains("Presto/") {
        return engine("Presto", token_version(raw, "Presto/"));
    }
    if raw.contains("AppleWebKit/") {
        if raw.contains("Chrome/") {
            return engine("Blink", token_version(raw, "Chrome/"));
        }
        return engine("WebKit", token_version(raw, "AppleWebKit/"));
    }
    if raw.contains("Gecko/") {
        return engine("Gecko", token_version(raw, "rv:"));
    }

    (None, None)
}
