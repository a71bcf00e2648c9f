/// Coarse device descriptor derived from a User-Agent string
///
/// The descriptor is `"<platform> <os> <browser>"`. It is not a hardware
/// fingerprint: two machines with the same platform, OS and browser produce
/// the same descriptor.

const UNKNOWN: &str = "unknown";

/// Ordered (needle, label) rules; the first match wins
const PLATFORMS: &[(&str, &str)] = &[
    ("iPad", "iPad"),
    ("iPod", "iPod"),
    ("iPhone", "iPhone"),
    ("Android", "Android"),
    ("BlackBerry", "Blackberry"),
    ("Windows Phone", "Windows Phone"),
    ("Windows", "Microsoft Windows"),
    ("Macintosh", "Apple Mac"),
    ("CrOS", "Chrome OS"),
    ("Linux", "Linux"),
];

const OPERATING_SYSTEMS: &[(&str, &str)] = &[
    ("Windows NT 10.0", "Windows 10.0"),
    ("Windows NT 6.3", "Windows 8.1"),
    ("Windows NT 6.2", "Windows 8"),
    ("Windows NT 6.1", "Windows 7"),
    ("Windows Phone", "Windows Phone"),
    ("iPhone OS", "iOS"),
    ("CPU OS", "iOS"),
    ("Mac OS X", "OS X"),
    ("Android", "Android"),
    ("CrOS", "Chrome OS"),
    ("Ubuntu", "Ubuntu"),
    ("Linux", "Linux"),
];

// Edge and Opera also advertise Chrome, Chrome also advertises Safari
const BROWSERS: &[(&str, &str)] = &[
    ("Edg", "Edge"),
    ("OPR", "Opera"),
    ("Opera", "Opera"),
    ("YaBrowser", "Yandex"),
    ("SamsungBrowser", "Samsung"),
    ("Firefox", "Firefox"),
    ("FxiOS", "Firefox"),
    ("CriOS", "Chrome"),
    ("Chrome", "Chrome"),
    ("Safari", "Safari"),
    ("MSIE", "IE"),
    ("Trident", "IE"),
    ("PostmanRuntime", "PostmanRuntime"),
    ("curl", "curl"),
];

fn classify<'a>(user_agent: &str, rules: &'a [(&str, &'a str)]) -> &'a str {
    rules
        .iter()
        .find(|(needle, _)| user_agent.contains(needle))
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN)
}

/// Build the descriptor for a request's User-Agent
pub fn device_model(user_agent: Option<&str>) -> String {
    let ua = user_agent.unwrap_or_default();
    format!(
        "{} {} {}",
        classify(ua, PLATFORMS),
        classify(ua, OPERATING_SYSTEMS),
        classify(ua, BROWSERS)
    )
}
