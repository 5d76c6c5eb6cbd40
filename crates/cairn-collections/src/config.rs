use serde::{Deserialize, Serialize};

/// Shape parameters for building sequence trees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Average number of entries per node. An entry closes its node when its
    /// hash is a multiple of this.
    pub target_fanout: u32,
    /// Hard cap on entries per node.
    pub max_fanout: usize,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            target_fanout: 32,
            max_fanout: 256,
        }
    }
}

impl SequenceConfig {
    /// Small nodes, so that even short collections grow several levels.
    /// Mostly useful in tests.
    pub fn narrow() -> Self {
        Self {
            target_fanout: 2,
            max_fanout: 4,
        }
    }

    /// Whether a node holding `len` entries, the last of which hashes to
    /// `prefix`, ends here.
    pub(crate) fn closes(&self, len: usize, prefix: u32) -> bool {
        if len < 2 {
            return false;
        }
        len >= self.max_fanout.max(2) || prefix % self.target_fanout.max(1) == 0
    }
}
