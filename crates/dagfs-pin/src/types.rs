use std::collections::BTreeMap;
use std::fmt;

use dagfs_types::Cid;
use serde::{Deserialize, Serialize};

/// How a stored pin protects its CID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    Direct,
    Recursive,
}

impl PinMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PinMode::Direct => "direct",
            PinMode::Recursive => "recursive",
        }
    }
}

/// A stored pin record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    #[serde(with = "dagfs_types::serde_cid")]
    pub cid: Cid,
    pub mode: PinMode,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Pin {
    pub fn new(cid: Cid, mode: PinMode) -> Self {
        Self {
            cid,
            mode,
            metadata: BTreeMap::new(),
        }
    }
}

/// Why a CID is protected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinStatus {
    Direct,
    Recursive,
    /// Reachable from the recursive pin `via`.
    Indirect { via: Cid },
}

impl PinStatus {
    pub fn type_name(&self) -> &'static str {
        match self {
            PinStatus::Direct => "direct",
            PinStatus::Recursive => "recursive",
            PinStatus::Indirect { .. } => "indirect",
        }
    }
}

impl From<PinMode> for PinStatus {
    fn from(mode: PinMode) -> Self {
        match mode {
            PinMode::Direct => PinStatus::Direct,
            PinMode::Recursive => PinStatus::Recursive,
        }
    }
}

impl fmt::Display for PinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinStatus::Indirect { via } => write!(f, "indirect through {via}"),
            other => f.write_str(other.type_name()),
        }
    }
}

impl Serialize for PinStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which pins `ls` reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinFilter {
    #[default]
    All,
    Direct,
    Recursive,
    Indirect,
}

impl PinFilter {
    pub fn accepts(self, status: &PinStatus) -> bool {
        matches!(
            (self, status),
            (PinFilter::All, _)
                | (PinFilter::Direct, PinStatus::Direct)
                | (PinFilter::Recursive, PinStatus::Recursive)
                | (PinFilter::Indirect, PinStatus::Indirect { .. })
        )
    }
}

impl std::str::FromStr for PinFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(PinFilter::All),
            "direct" => Ok(PinFilter::Direct),
            "recursive" => Ok(PinFilter::Recursive),
            "indirect" => Ok(PinFilter::Indirect),
            other => Err(format!("unknown pin type {other:?}")),
        }
    }
}

/// One line of `ls`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PinEntry {
    #[serde(with = "dagfs_types::serde_cid")]
    pub cid: Cid,
    #[serde(rename = "type")]
    pub status: PinStatus,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagfs_types::parse_cid;

    #[test]
    fn indirect_display_names_the_root() {
        let via = parse_cid("QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn").unwrap();
        let status = PinStatus::Indirect { via };
        assert_eq!(status.to_string(), format!("indirect through {via}"));
        assert_eq!(status.type_name(), "indirect");
    }

    #[test]
    fn filter_matching() {
        assert!(PinFilter::All.accepts(&PinStatus::Direct));
        assert!(PinFilter::Recursive.accepts(&PinStatus::Recursive));
        assert!(!PinFilter::Direct.accepts(&PinStatus::Recursive));
        assert_eq!("indirect".parse::<PinFilter>().unwrap(), PinFilter::Indirect);
        assert!("sideways".parse::<PinFilter>().is_err());
    }

    #[test]
    fn pin_record_json() {
        let cid = parse_cid("QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn").unwrap();
        let mut pin = Pin::new(cid, PinMode::Recursive);
        pin.metadata.insert("app".into(), serde_json::json!("photos"));
        let text = serde_json::to_string(&pin).unwrap();
        assert!(text.contains("\"recursive\""));
        assert_eq!(serde_json::from_str::<Pin>(&text).unwrap(), pin);
    }
}
