// Selection filter: which discovered resources the user opted into.
//
// Container and stack entries exist in two encodings. Entries written today use
// the config id (`{config_id}_{endpoint_id}_{name}`); older entries used the
// instance display name in the same position. Both are accepted, neither is
// rewritten.

use crate::fetcher::RawStack;
use crate::models::{Container, ResourceKey, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// User selection as persisted in configuration. Empty means nothing is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Bare endpoint ids (`"1"`).
    #[serde(default)]
    pub endpoints: BTreeSet<String>,
    #[serde(default)]
    pub containers: BTreeSet<String>,
    /// Bare stack ids or either composite encoding with the stack id as name.
    #[serde(default)]
    pub stacks: BTreeSet<String>,
}

/// Current encoding: `{config_id}_{endpoint_id}_{name}`.
pub fn config_key(config_id: &str, endpoint_id: u64, name: &str) -> String {
    format!("{}_{}_{}", config_id, endpoint_id, name)
}

/// Legacy encoding: `{config_display_name}_{endpoint_id}_{name}`.
pub fn legacy_key(config_name: &str, endpoint_id: u64, name: &str) -> String {
    format!("{}_{}_{}", config_name, endpoint_id, name)
}

/// Both candidate encodings of one logical resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionKeys {
    pub primary: String,
    pub legacy: String,
}

impl SelectionKeys {
    pub fn new(config_id: &str, config_name: &str, endpoint_id: u64, name: &str) -> Self {
        Self {
            primary: config_key(config_id, endpoint_id, name),
            legacy: legacy_key(config_name, endpoint_id, name),
        }
    }

    pub fn matches(&self, selected: &BTreeSet<String>) -> bool {
        selected.contains(&self.primary) || selected.contains(&self.legacy)
    }
}

/// Anything addressable by `(endpoint id, name)` within one instance.
pub trait Selectable {
    fn endpoint_id(&self) -> u64;
    fn selection_name(&self) -> String;
}

impl Selectable for Container {
    fn endpoint_id(&self) -> u64 {
        self.endpoint_id
    }

    fn selection_name(&self) -> String {
        self.name.clone()
    }
}

impl Selectable for RawStack {
    fn endpoint_id(&self) -> u64 {
        self.endpoint_id
    }

    fn selection_name(&self) -> String {
        self.id.to_string()
    }
}

/// Splits `items` into `(accepted, rejected)`; an item is accepted when either of
/// its encodings is in `selected`. Pure and order-preserving.
pub fn filter<T: Selectable>(
    items: Vec<T>,
    selected: &BTreeSet<String>,
    config_id: &str,
    config_name: &str,
) -> (Vec<T>, Vec<T>) {
    items.into_iter().partition(|item| {
        SelectionKeys::new(
            config_id,
            config_name,
            item.endpoint_id(),
            &item.selection_name(),
        )
        .matches(selected)
    })
}

/// A selection bound to the identity of the owning instance.
#[derive(Debug, Clone, Copy)]
pub struct SelectionFilter<'a> {
    config_id: &'a str,
    config_name: &'a str,
    selection: &'a Selection,
}

impl<'a> SelectionFilter<'a> {
    pub fn new(config_id: &'a str, config_name: &'a str, selection: &'a Selection) -> Self {
        Self {
            config_id,
            config_name,
            selection,
        }
    }

    pub fn endpoint_selected(&self, endpoint_id: u64) -> bool {
        self.selection.endpoints.contains(&endpoint_id.to_string())
    }

    pub fn container_selected(&self, endpoint_id: u64, name: &str) -> bool {
        SelectionKeys::new(self.config_id, self.config_name, endpoint_id, name)
            .matches(&self.selection.containers)
    }

    pub fn stack_selected(&self, endpoint_id: u64, stack_id: u64) -> bool {
        let id = stack_id.to_string();
        self.selection.stacks.contains(&id)
            || SelectionKeys::new(self.config_id, self.config_name, endpoint_id, &id)
                .matches(&self.selection.stacks)
    }

    /// Whether a previously seen resource is still expected. Containers and stacks
    /// also require their endpoint to stay selected, since nothing below an
    /// unselected endpoint is fetched.
    pub fn accepts_key(&self, key: &ResourceKey) -> bool {
        let endpoint_id = key.endpoint_id();
        match key.kind() {
            ResourceKind::Endpoint => self.endpoint_selected(endpoint_id),
            ResourceKind::Container => {
                self.endpoint_selected(endpoint_id)
                    && self.container_selected(endpoint_id, key.name())
            }
            ResourceKind::Stack => {
                self.endpoint_selected(endpoint_id)
                    && key
                        .name()
                        .parse::<u64>()
                        .is_ok_and(|id| self.stack_selected(endpoint_id, id))
            }
        }
    }

    /// Keys the selection names directly, discovered or not. Containers and stacks
    /// only count under a selected endpoint. A bare stack id carries no endpoint,
    /// so it resolves to a key only while exactly one endpoint is selected;
    /// otherwise it is tracked once it has been seen.
    pub fn selected_keys(&self) -> BTreeSet<ResourceKey> {
        let endpoints: BTreeSet<u64> = self
            .selection
            .endpoints
            .iter()
            .filter_map(|e| e.parse().ok())
            .collect();
        let mut keys: BTreeSet<ResourceKey> = endpoints
            .iter()
            .map(|&id| ResourceKey::endpoint(self.config_id, id))
            .collect();

        for entry in &self.selection.containers {
            if let Some((endpoint_id, name)) = self.split_entry(entry) {
                if endpoints.contains(&endpoint_id) {
                    keys.insert(ResourceKey::container(self.config_id, endpoint_id, name));
                }
            }
        }

        let sole_endpoint = match endpoints.len() {
            1 => endpoints.first().copied(),
            _ => None,
        };
        for entry in &self.selection.stacks {
            if let Ok(stack_id) = entry.parse::<u64>() {
                if let Some(endpoint_id) = sole_endpoint {
                    keys.insert(ResourceKey::stack(self.config_id, endpoint_id, stack_id));
                }
                continue;
            }
            let Some((endpoint_id, name)) = self.split_entry(entry) else {
                continue;
            };
            if let Ok(stack_id) = name.parse::<u64>() {
                if endpoints.contains(&endpoint_id) {
                    keys.insert(ResourceKey::stack(self.config_id, endpoint_id, stack_id));
                }
            }
        }
        keys
    }

    /// `{prefix}_{endpoint_id}_{name}` in either encoding to `(endpoint_id, name)`.
    fn split_entry<'e>(&self, entry: &'e str) -> Option<(u64, &'e str)> {
        [self.config_id, self.config_name]
            .into_iter()
            .filter(|prefix| !prefix.is_empty())
            .find_map(|prefix| {
                let rest = entry.strip_prefix(prefix)?.strip_prefix('_')?;
                let (endpoint_id, name) = rest.split_once('_')?;
                let endpoint_id = endpoint_id.parse().ok()?;
                (!name.is_empty()).then_some((endpoint_id, name))
            })
    }

    pub fn containers(&self, items: Vec<Container>) -> (Vec<Container>, Vec<Container>) {
        filter(
            items,
            &self.selection.containers,
            self.config_id,
            self.config_name,
        )
    }

    pub fn stacks(&self, items: Vec<RawStack>) -> (Vec<RawStack>, Vec<RawStack>) {
        items
            .into_iter()
            .partition(|s| self.stack_selected(s.endpoint_id, s.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(id: u64, endpoint_id: u64) -> RawStack {
        RawStack {
            id,
            name: format!("stack{}", id),
            endpoint_id,
            ..Default::default()
        }
    }

    #[test]
    fn key_derivations_share_layout() {
        assert_eq!(config_key("01K7", 2, "ots-app-1"), "01K7_2_ots-app-1");
        assert_eq!(legacy_key("Portainer", 2, "ots-app-1"), "Portainer_2_ots-app-1");
    }

    #[test]
    fn stacks_accept_bare_id_and_both_encodings() {
        let selection = Selection {
            endpoints: BTreeSet::from(["1".to_string()]),
            containers: BTreeSet::new(),
            stacks: BTreeSet::from([
                "7".to_string(),
                "cfg_1_8".to_string(),
                "Home_1_9".to_string(),
            ]),
        };
        let f = SelectionFilter::new("cfg", "Home", &selection);
        let (accepted, rejected) =
            f.stacks(vec![stack(7, 1), stack(8, 1), stack(9, 1), stack(10, 1)]);
        let ids: Vec<u64> = accepted.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![7, 8, 9]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].id, 10);
    }

    #[test]
    fn accepts_key_requires_endpoint_selection() {
        let selection = Selection {
            endpoints: BTreeSet::from(["1".to_string()]),
            containers: BTreeSet::from(["cfg_1_web".to_string(), "cfg_2_web".to_string()]),
            stacks: BTreeSet::new(),
        };
        let f = SelectionFilter::new("cfg", "Home", &selection);
        assert!(f.accepts_key(&ResourceKey::container("cfg", 1, "web")));
        assert!(!f.accepts_key(&ResourceKey::container("cfg", 2, "web")));
        assert!(f.accepts_key(&ResourceKey::endpoint("cfg", 1)));
        assert!(!f.accepts_key(&ResourceKey::endpoint("cfg", 2)));
        assert!(!f.accepts_key(&ResourceKey::stack("cfg", 1, 3)));
    }

    #[test]
    fn selected_keys_include_never_seen_entries() {
        let selection = Selection {
            endpoints: BTreeSet::from(["1".to_string(), "2".to_string()]),
            containers: BTreeSet::from([
                "cfg_1_web".to_string(),
                "Home_2_my_db".to_string(),
                "cfg_3_orphan".to_string(),
                "garbage".to_string(),
            ]),
            stacks: BTreeSet::from(["7".to_string(), "Home_2_9".to_string()]),
        };
        let f = SelectionFilter::new("cfg", "Home", &selection);
        let keys = f.selected_keys();
        assert_eq!(
            keys,
            BTreeSet::from([
                ResourceKey::endpoint("cfg", 1),
                ResourceKey::endpoint("cfg", 2),
                ResourceKey::container("cfg", 1, "web"),
                ResourceKey::container("cfg", 2, "my_db"),
                ResourceKey::stack("cfg", 2, 9),
            ])
        );
        assert!(keys.iter().all(|k| f.accepts_key(k)));
    }

    #[test]
    fn bare_stack_id_resolves_under_a_single_endpoint() {
        let selection = Selection {
            endpoints: BTreeSet::from(["4".to_string()]),
            containers: BTreeSet::new(),
            stacks: BTreeSet::from(["7".to_string()]),
        };
        let f = SelectionFilter::new("cfg", "Home", &selection);
        assert!(f.selected_keys().contains(&ResourceKey::stack("cfg", 4, 7)));
    }
}
