//! Resource kind -> graph group allocation.

use std::collections::HashMap;

use crate::types::{NODE_GROUP, NODE_KIND};

/// Assigns group ids to resource kinds in first-seen order.
///
/// The `Node` kind is pre-seeded with [`NODE_GROUP`]; every other kind gets
/// the next unused integer. A registry created per construction pass gives
/// the pass-local numbering; one kept across passes gives stable ids.
#[derive(Debug, Clone)]
pub struct GroupRegistry {
    ids: HashMap<String, u32>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        let mut ids = HashMap::new();
        ids.insert(NODE_KIND.to_string(), NODE_GROUP);
        Self { ids }
    }

    /// Group of `kind`, allocating the next id on first sight.
    pub fn group_for(&mut self, kind: &str) -> u32 {
        if let Some(&gid) = self.ids.get(kind) {
            return gid;
        }
        let gid = u32::try_from(self.ids.len()).unwrap_or(u32::MAX);
        self.ids.insert(kind.to_string(), gid);
        gid
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_allocation() {
        let mut groups = GroupRegistry::new();
        assert_eq!(groups.group_for("Node"), NODE_GROUP);
        assert_eq!(groups.group_for("Workload"), 1);
        assert_eq!(groups.group_for("File"), 2);
        assert_eq!(groups.group_for("Workload"), 1);
        assert_eq!(groups.group_for("Database"), 3);
    }
}
