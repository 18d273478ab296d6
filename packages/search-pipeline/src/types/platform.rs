//! Known content platforms.
//!
//! Target sources arrive as free text ("YouTube", "ig", "reddit.com"). This table
//! maps them to canonical names and domains so routing, scoring and placeholder
//! generation agree on what a source is.

/// A platform the pipeline knows how to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Canonical lowercase name
    pub name: &'static str,

    /// Primary domain (no scheme, no `www.`)
    pub domain: &'static str,

    /// Alternative spellings accepted in hints and queries
    pub aliases: &'static [&'static str],

    /// Search page used for generated suggestions; `{q}` is the encoded query
    pub search_url: &'static str,
}

/// Platforms recognised in hints, queries and URLs.
pub const KNOWN_PLATFORMS: &[Platform] = &[
    Platform {
        name: "youtube",
        domain: "youtube.com",
        aliases: &["yt", "youtu.be"],
        search_url: "https://www.youtube.com/results?search_query={q}",
    },
    Platform {
        name: "instagram",
        domain: "instagram.com",
        aliases: &["ig", "insta"],
        search_url: "https://www.instagram.com/explore/search/keyword/?q={q}",
    },
    Platform {
        name: "tiktok",
        domain: "tiktok.com",
        aliases: &["tik tok"],
        search_url: "https://www.tiktok.com/search?q={q}",
    },
    Platform {
        name: "twitter",
        domain: "twitter.com",
        aliases: &["x", "x.com", "tweets"],
        search_url: "https://twitter.com/search?q={q}",
    },
    Platform {
        name: "twitch",
        domain: "twitch.tv",
        aliases: &["streamers"],
        search_url: "https://www.twitch.tv/search?term={q}",
    },
    Platform {
        name: "linkedin",
        domain: "linkedin.com",
        aliases: &[],
        search_url: "https://www.linkedin.com/search/results/all/?keywords={q}",
    },
    Platform {
        name: "reddit",
        domain: "reddit.com",
        aliases: &["subreddit"],
        search_url: "https://www.reddit.com/search/?q={q}",
    },
    Platform {
        name: "amazon",
        domain: "amazon.com",
        aliases: &[],
        search_url: "https://www.amazon.com/s?k={q}",
    },
];

/// Generic web search used when no platform applies.
pub const WEB_SEARCH_URL: &str = "https://duckduckgo.com/?q={q}";

/// Look up a platform by name, alias or domain (case-insensitive).
pub fn platform_by_name(name: &str) -> Option<&'static Platform> {
    let needle = name.trim().to_lowercase();
    let needle = needle.trim_start_matches("www.");
    KNOWN_PLATFORMS.iter().find(|p| {
        p.name == needle || p.domain == needle || p.aliases.iter().any(|a| *a == needle)
    })
}

/// Platform owning a host, matching subdomains (`m.youtube.com`).
pub fn platform_for_host(host: &str) -> Option<&'static Platform> {
    let host = host.to_lowercase();
    KNOWN_PLATFORMS.iter().find(|p| {
        host == p.domain
            || host.ends_with(&format!(".{}", p.domain))
            || p.aliases
                .iter()
                .any(|a| a.contains('.') && (host == *a || host.ends_with(&format!(".{a}"))))
    })
}

/// Domain to scope a search to for a target source.
///
/// Known platforms resolve to their domain; anything that already looks like a
/// domain is used as-is. Free text that is neither yields `None`.
pub fn domain_for_source(source: &str) -> Option<String> {
    if let Some(platform) = platform_by_name(source) {
        return Some(platform.domain.to_string());
    }

    let candidate = source.trim().to_lowercase();
    let candidate = candidate.trim_start_matches("www.");
    let looks_like_domain = candidate.contains('.')
        && !candidate.contains(char::is_whitespace)
        && !candidate.contains('/');
    looks_like_domain.then(|| candidate.to_string())
}

/// Canonical name for a target source (platform name, else trimmed lowercase).
pub fn canonical_source(source: &str) -> String {
    platform_by_name(source)
        .map(|p| p.name.to_string())
        .unwrap_or_else(|| source.trim().to_lowercase())
}

/// Platforms mentioned by name in free text, in table order.
pub fn detect_platforms(text: &str) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric() && c != '.')
        .filter(|w| !w.is_empty())
        .collect();

    KNOWN_PLATFORMS
        .iter()
        .filter(|p| {
            words.iter().any(|w| {
                let w = w.trim_end_matches('.');
                // single-letter aliases are too noisy to detect in prose
                w == p.name
                    || w == p.domain
                    || p.aliases.iter().any(|a| a.len() > 2 && *a == w)
            })
        })
        .map(|p| p.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_lookup_by_alias_and_domain() {
        assert_eq!(platform_by_name("YouTube").map(|p| p.name), Some("youtube"));
        assert_eq!(platform_by_name("ig").map(|p| p.name), Some("instagram"));
        assert_eq!(platform_by_name("www.reddit.com").map(|p| p.name), Some("reddit"));
        assert!(platform_by_name("myspace").is_none());
    }

    #[test]
    fn test_platform_for_host_matches_subdomains() {
        assert_eq!(platform_for_host("m.youtube.com").map(|p| p.name), Some("youtube"));
        assert_eq!(platform_for_host("x.com").map(|p| p.name), Some("twitter"));
        assert!(platform_for_host("notyoutube.com").is_none());
    }

    #[test]
    fn test_domain_for_source() {
        assert_eq!(domain_for_source("TikTok").as_deref(), Some("tiktok.com"));
        assert_eq!(domain_for_source("news.ycombinator.com").as_deref(), Some("news.ycombinator.com"));
        assert_eq!(domain_for_source("blogs"), None);
    }

    #[test]
    fn test_detect_platforms_in_query() {
        assert_eq!(
            detect_platforms("tech reviewers on YouTube and Instagram"),
            vec!["youtube", "instagram"]
        );
        assert!(detect_platforms("best laptops under $1000").is_empty());
        // "x" alone is not treated as twitter
        assert!(detect_platforms("x marks the spot").is_empty());
    }
}
