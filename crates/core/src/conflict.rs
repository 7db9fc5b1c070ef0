use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A class of merge conflict a caller may let the merge engine resolve by
/// leaving the conflicting content on the source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Description,
    Sitelink,
    Statement,
}

impl ConflictKind {
    pub const ALL: [ConflictKind; 3] = [Self::Description, Self::Sitelink, Self::Statement];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::Sitelink => "sitelink",
            Self::Statement => "statement",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conflict categories the merge engine may ignore, iterated in rank order.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct ConflictSet(BTreeSet<ConflictKind>);

impl ConflictSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Keep recognised category names and return the rejected ones separately.
    pub fn sanitize<I, S>(raw: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        let mut rejected = Vec::new();
        for name in raw {
            let name = name.as_ref();
            match ConflictKind::parse(name.trim()) {
                Some(kind) => {
                    set.insert(kind);
                }
                None => rejected.push(name.to_string()),
            }
        }
        (Self(set), rejected)
    }

    pub fn contains(&self, kind: ConflictKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn insert(&mut self, kind: ConflictKind) {
        self.0.insert(kind);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ConflictKind> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<ConflictKind> for ConflictSet {
    fn from_iter<T: IntoIterator<Item = ConflictKind>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_unknown_names() {
        let (set, rejected) =
            ConflictSet::sanitize(["sitelink", "bogus", "description", "sitelink"]);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![ConflictKind::Description, ConflictKind::Sitelink]
        );
        assert_eq!(rejected, vec!["bogus".to_string()]);
    }

    #[test]
    fn sanitize_empty_input() {
        let (set, rejected) = ConflictSet::sanitize(Vec::<String>::new());
        assert!(set.is_empty());
        assert!(rejected.is_empty());
    }

    #[test]
    fn names_roundtrip() {
        for kind in ConflictKind::ALL {
            assert_eq!(ConflictKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ConflictKind::parse("Description"), None);
    }
}
