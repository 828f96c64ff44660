use std::fmt;

use crate::record::Record;

/// Cluster identifier assigned by the matching service (0-based on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(pub u64);

impl ClusterId {
    /// 1-based number shown to users and written to exports.
    pub fn display_number(self) -> u64 {
        self.0 + 1
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_number())
    }
}

/// Records the service believes refer to the same real-world entity.
/// Read-only once received; replaced wholesale by the next result set.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub cluster_id: ClusterId,
    /// 0.0–1.0
    pub confidence: f64,
    pub members: Vec<Record>,
}

impl DuplicateGroup {
    pub fn new(cluster_id: ClusterId, confidence: f64, members: Vec<Record>) -> Self {
        Self { cluster_id, confidence, members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The canonical survivor (first listed member).
    pub fn survivor(&self) -> Option<&Record> {
        self.members.first()
    }
}
