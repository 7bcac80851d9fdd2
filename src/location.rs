// src/location.rs
use url::Url;

pub const AUTO_KNOCK_PARAM: &str = "autoKnock";

/// The page URL. Only the `autoKnock` query parameter means anything; the
/// path is ignored since there is a single view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    url: Url,
}

impl Location {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Url::parse(raw).map(Self::new)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn auto_knock_requested(&self) -> bool {
        self.url
            .query_pairs()
            .any(|(k, v)| k == AUTO_KNOCK_PARAM && v == "true")
    }

    /// Replace the query with `autoKnock=true`, or drop it entirely.
    pub fn set_auto_knock(&mut self, enabled: bool) {
        if enabled {
            self.url
                .query_pairs_mut()
                .clear()
                .append_pair(AUTO_KNOCK_PARAM, "true");
        } else {
            self.url.set_query(None);
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new(Url::parse("http://localhost/").expect("static URL parses"))
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_auto_knock_param() {
        assert!(Location::parse("https://app/?autoKnock=true").unwrap().auto_knock_requested());
        assert!(Location::parse("https://app/any/path?x=1&autoKnock=true").unwrap().auto_knock_requested());
        assert!(!Location::parse("https://app/?autoKnock=false").unwrap().auto_knock_requested());
        assert!(!Location::parse("https://app/?autoKnock=1").unwrap().auto_knock_requested());
        assert!(!Location::parse("https://app/").unwrap().auto_knock_requested());
    }

    #[test]
    fn toggling_rewrites_query() {
        let mut loc = Location::parse("https://app/").unwrap();
        loc.set_auto_knock(true);
        assert_eq!(loc.to_string(), "https://app/?autoKnock=true");
        loc.set_auto_knock(false);
        assert_eq!(loc.to_string(), "https://app/");
    }
}
