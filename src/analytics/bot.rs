//! Automated-agent detection by user agent substring

/// Substrings of known link-preview fetchers, crawlers and social card bots.
pub const DEFAULT_BOT_PATTERNS: &[&str] = &[
    "whatsapp",
    "facebookexternalhit",
    "twitterbot",
    "telegrambot",
    "discordbot",
    "googlebot",
    "bingbot",
    "slackbot",
    "applebot",
    "pinterest",
    "linkedinbot",
    "skypeuripreview",
    "zoom",
    "teams",
];

/// Classifies user agents as automated or human.
///
/// Matching is case-insensitive and substring-based, so versioned agents
/// such as `WhatsApp/2.23.20.0` match the `whatsapp` pattern. A missing
/// user agent counts as human.
#[derive(Debug, Clone)]
pub struct BotClassifier {
    patterns: Vec<String>,
}

impl BotClassifier {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Self { patterns }
    }

    pub fn is_bot(&self, user_agent: Option<&str>) -> bool {
        let Some(user_agent) = user_agent else {
            return false;
        };

        let lowered = user_agent.to_lowercase();
        self.patterns.iter().any(|p| lowered.contains(p.as_str()))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for BotClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_BOT_PATTERNS)
    }
}
