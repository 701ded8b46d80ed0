use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of playable content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "tv" | "show" | "series" => Ok(Self::Tv),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// Identifies one playable unit (a movie, or one episode of a show).
///
/// Equality and hashing are structural, so two keys built from the same
/// fields always address the same cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey {
    pub content_id: String,
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
}

impl ContentKey {
    #[must_use]
    pub fn movie(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            media_type: MediaType::Movie,
            season: None,
            episode: None,
        }
    }

    #[must_use]
    pub fn episode(content_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            content_id: content_id.into(),
            media_type: MediaType::Tv,
            season: Some(season),
            episode: Some(episode),
        }
    }
}

impl std::fmt::Display for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.media_type, self.content_id)?;
        if let (Some(season), Some(episode)) = (self.season, self.episode) {
            write!(f, ":s{season}e{episode}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_structural_equality() {
        assert_eq!(ContentKey::movie("603"), ContentKey::movie("603"));
        assert_ne!(ContentKey::movie("603"), ContentKey::episode("603", 1, 1));
        assert_ne!(ContentKey::episode("1399", 1, 1), ContentKey::episode("1399", 1, 2));

        let set: HashSet<_> = [ContentKey::movie("603"), ContentKey::movie("603")].into();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(ContentKey::movie("603").to_string(), "movie:603");
        assert_eq!(ContentKey::episode("1399", 1, 2).to_string(), "tv:1399:s1e2");
    }

    #[test]
    fn test_media_type_from_str() {
        assert_eq!("Movie".parse::<MediaType>().unwrap(), MediaType::Movie);
        assert_eq!("series".parse::<MediaType>().unwrap(), MediaType::Tv);
        assert!("podcast".parse::<MediaType>().is_err());
    }
}
