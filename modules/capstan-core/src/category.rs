use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Broad family a capability belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Storage,
    General,
    Network,
    KvStore,
    Trigger,
    Service,
    SqlStore,
    Database,
    CacheStore,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Storage,
        Category::General,
        Category::Network,
        Category::KvStore,
        Category::Trigger,
        Category::Service,
        Category::SqlStore,
        Category::Database,
        Category::CacheStore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Storage => "storage",
            Category::General => "general",
            Category::Network => "network",
            Category::KvStore => "kvstore",
            Category::Trigger => "trigger",
            Category::Service => "service",
            Category::SqlStore => "sqlstore",
            Category::Database => "database",
            Category::CacheStore => "cachestore",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown capability category: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        for category in Category::ALL {
            assert_eq!(category.to_string().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("KVStore".parse::<Category>(), Ok(Category::KvStore));
        assert!("blob".parse::<Category>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Category::CacheStore).unwrap();
        assert_eq!(json, "\"cachestore\"");
    }
}
