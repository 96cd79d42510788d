//! Activity-type registry and configuration lookup
//!
//! Both are external collaborators: the registry maps `<kind>.<action>` keys
//! to integer activity codes, and the config lookup yields the rank delta of
//! each key under `rank.<kind>.<action>` plus the daily cap and its
//! exemptions. The ledger only sees the traits.

use crate::config::RANK_KEY_PREFIX;
use crate::types::{Action, ActivityType, ObjectKind};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Bidirectional key <-> code mapping
pub trait ActivityRegistry: Send + Sync {
    /// Code of an activity key
    fn code_of(&self, key: &str) -> Option<ActivityType>;

    /// Key of an activity code
    fn key_of(&self, code: ActivityType) -> Option<&str>;
}

/// Configuration lookup
pub trait ConfigLookup: Send + Sync {
    /// Integer value of a key
    fn get_int(&self, key: &str) -> Result<i64>;

    /// String list value of a key
    fn get_array_string(&self, key: &str) -> Result<Vec<String>>;

    /// Integer value, falling back when the key is absent
    fn get_int_or(&self, key: &str, default: i64) -> Result<i64> {
        match self.get_int(key) {
            Err(Error::Config(_)) => Ok(default),
            other => other,
        }
    }
}

const DEFAULT_ACTIVITY_TYPES: &[(&str, u32)] = &[
    ("question.follow", 10),
    ("question.vote_up", 11),
    ("question.voted_up", 12),
    ("question.vote_down", 13),
    ("question.voted_down", 14),
    ("answer.vote_up", 20),
    ("answer.voted_up", 21),
    ("answer.vote_down", 22),
    ("answer.voted_down", 23),
    ("answer.accept", 24),
    ("answer.accepted", 25),
    ("tag.follow", 30),
    ("user.follow", 40),
    ("comment.vote_up", 50),
    ("comment.vote_down", 51),
];

/// In-memory registry
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    by_key: HashMap<String, ActivityType>,
    by_code: HashMap<ActivityType, String>,
}

impl StaticRegistry {
    /// Build from `(key, code)` pairs
    pub fn new<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, u32)>,
        K: Into<String>,
    {
        let mut by_key = HashMap::new();
        let mut by_code = HashMap::new();

        for (key, code) in entries {
            let key = key.into();
            let code = ActivityType(code);
            if by_code.insert(code, key.clone()).is_some() {
                return Err(Error::Config(format!("activity code {} assigned twice", code)));
            }
            if by_key.insert(key.clone(), code).is_some() {
                return Err(Error::Config(format!("activity key {} assigned twice", key)));
            }
        }

        Ok(Self { by_key, by_code })
    }
}

impl Default for StaticRegistry {
    fn default() -> Self {
        let by_key: HashMap<String, ActivityType> = DEFAULT_ACTIVITY_TYPES
            .iter()
            .map(|(key, code)| (key.to_string(), ActivityType(*code)))
            .collect();
        let by_code = by_key.iter().map(|(k, c)| (*c, k.clone())).collect();
        Self { by_key, by_code }
    }
}

impl ActivityRegistry for StaticRegistry {
    fn code_of(&self, key: &str) -> Option<ActivityType> {
        self.by_key.get(key).copied()
    }

    fn key_of(&self, code: ActivityType) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }
}

/// Resolved activity: code plus configured rank effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityDef {
    /// `<kind>.<action>`
    pub key: String,
    /// Registry code
    pub activity_type: ActivityType,
    /// Configured delta
    pub rank: i64,
    /// Whether the activity carries a rank effect
    pub has_rank: bool,
}

/// Resolves `(kind, action)` into an [`ActivityDef`]
#[derive(Clone)]
pub struct ActivityResolver {
    registry: Arc<dyn ActivityRegistry>,
    config: Arc<dyn ConfigLookup>,
}

impl ActivityResolver {
    /// Create resolver
    pub fn new(registry: Arc<dyn ActivityRegistry>, config: Arc<dyn ConfigLookup>) -> Self {
        Self { registry, config }
    }

    /// Resolve code and configured delta
    pub fn resolve(&self, kind: ObjectKind, action: Action) -> Result<ActivityDef> {
        let key = action.key(kind);
        let activity_type = self.code_of_key(&key)?;
        let rank = self.config.get_int_or(&format!("{}{}", RANK_KEY_PREFIX, key), 0)?;

        Ok(ActivityDef {
            key,
            activity_type,
            rank,
            has_rank: rank != 0,
        })
    }

    /// Code of a key, failing for unregistered keys
    pub fn code_of_key(&self, key: &str) -> Result<ActivityType> {
        self.registry
            .code_of(key)
            .ok_or_else(|| Error::Config(format!("unregistered activity key {}", key)))
    }

    /// Codes of every registered `vote_up` / `vote_down` key
    pub fn vote_types(&self) -> Vec<ActivityType> {
        [ObjectKind::Question, ObjectKind::Answer, ObjectKind::Comment]
            .into_iter()
            .flat_map(|kind| [Action::VoteUp, Action::VoteDown].map(|a| a.key(kind)))
            .filter_map(|key| self.registry.code_of(&key))
            .collect()
    }

    /// Vote codes including the received side (`voted_up` / `voted_down`)
    pub fn all_vote_types(&self) -> Vec<ActivityType> {
        [ObjectKind::Question, ObjectKind::Answer, ObjectKind::Comment]
            .into_iter()
            .flat_map(|kind| {
                [Action::VoteUp, Action::VotedUp, Action::VoteDown, Action::VotedDown]
                    .map(|a| a.key(kind))
            })
            .filter_map(|key| self.registry.code_of(&key))
            .collect()
    }

    /// Underlying registry
    pub fn registry(&self) -> &dyn ActivityRegistry {
        self.registry.as_ref()
    }

    /// Underlying config lookup
    pub fn config(&self) -> &dyn ConfigLookup {
        self.config.as_ref()
    }

    pub(crate) fn registry_handle(&self) -> Arc<dyn ActivityRegistry> {
        Arc::clone(&self.registry)
    }

    pub(crate) fn config_handle(&self) -> Arc<dyn ConfigLookup> {
        Arc::clone(&self.config)
    }
}

impl std::fmt::Debug for ActivityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankConfig;

    fn resolver(config: RankConfig) -> ActivityResolver {
        ActivityResolver::new(Arc::new(StaticRegistry::default()), Arc::new(config))
    }

    #[test]
    fn test_resolve_ranked_activity() {
        let def = resolver(RankConfig::default())
            .resolve(ObjectKind::Answer, Action::Accepted)
            .unwrap();

        assert_eq!(def.key, "answer.accepted");
        assert_eq!(def.activity_type, ActivityType(25));
        assert_eq!(def.rank, 15);
        assert!(def.has_rank);
    }

    /// Flat key/value lookup, as a shared config store would expose it
    struct FlatConfig(HashMap<&'static str, i64>);

    impl ConfigLookup for FlatConfig {
        fn get_int(&self, key: &str) -> Result<i64> {
            self.0
                .get(key)
                .copied()
                .ok_or_else(|| Error::Config(format!("missing integer key {}", key)))
        }

        fn get_array_string(&self, key: &str) -> Result<Vec<String>> {
            Err(Error::Config(format!("missing list key {}", key)))
        }
    }

    #[test]
    fn test_deltas_are_read_under_rank_prefix() {
        let config = FlatConfig(
            [("rank.answer.accepted", 7), ("answer.voted_up", 99)]
                .into_iter()
                .collect(),
        );
        let resolver = ActivityResolver::new(Arc::new(StaticRegistry::default()), Arc::new(config));

        assert_eq!(resolver.resolve(ObjectKind::Answer, Action::Accepted).unwrap().rank, 7);
        // A bare activity key is not a delta
        let voted = resolver.resolve(ObjectKind::Answer, Action::VotedUp).unwrap();
        assert_eq!(voted.rank, 0);
        assert!(!voted.has_rank);
    }

    #[test]
    fn test_missing_delta_means_no_rank() {
        let mut config = RankConfig::default();
        config.deltas.clear();

        let def = resolver(config).resolve(ObjectKind::Tag, Action::Follow).unwrap();
        assert_eq!(def.rank, 0);
        assert!(!def.has_rank);
    }

    #[test]
    fn test_unregistered_key_is_config_error() {
        let err = resolver(RankConfig::default())
            .resolve(ObjectKind::Tag, Action::VoteUp)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_registry_rejects_duplicate_codes() {
        assert!(StaticRegistry::new([("a.x", 1), ("b.y", 1)]).is_err());

        let registry = StaticRegistry::new([("a.x", 1), ("b.y", 2)]).unwrap();
        assert_eq!(registry.key_of(ActivityType(2)), Some("b.y"));
        assert_eq!(registry.code_of("a.x"), Some(ActivityType(1)));
    }

    #[test]
    fn test_vote_types_cover_cast_votes_only() {
        let resolver = resolver(RankConfig::default());
        assert_eq!(resolver.vote_types().len(), 6);
        assert_eq!(resolver.all_vote_types().len(), 10);
    }
}
