use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity at which text is embedded and indexed.
///
/// Ordering follows the hierarchy, finest first, so `BTreeMap<Level, _>`
/// iterates sentence → paragraph → document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Sentence,
    Paragraph,
    Document,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Sentence, Level::Paragraph, Level::Document];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Sentence => "sentence",
            Level::Paragraph => "paragraph",
            Level::Document => "document",
        }
    }

    /// Level-named artifact file, e.g. `paragraph.idx`.
    pub fn file_name(&self) -> String {
        format!("{}.idx", self.as_str())
    }

    /// The next coarser level that groups units of this level.
    pub fn parent(&self) -> Option<Level> {
        match self {
            Level::Sentence => Some(Level::Paragraph),
            Level::Paragraph => Some(Level::Document),
            Level::Document => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sentence" => Ok(Level::Sentence),
            "paragraph" => Ok(Level::Paragraph),
            "document" => Ok(Level::Document),
            other => Err(format!("unknown level `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_parents() {
        assert_eq!(Level::Sentence.parent(), Some(Level::Paragraph));
        assert_eq!(Level::Paragraph.parent(), Some(Level::Document));
        assert_eq!(Level::Document.parent(), None);
    }

    #[test]
    fn ordering_is_finest_first() {
        let mut levels = vec![Level::Document, Level::Sentence, Level::Paragraph];
        levels.sort();
        assert_eq!(levels, Level::ALL.to_vec());
    }

    #[test]
    fn names_round_trip() {
        for level in Level::ALL {
            assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
        }
        assert_eq!(Level::Document.file_name(), "document.idx");
        assert!("chapter".parse::<Level>().is_err());
    }
}
