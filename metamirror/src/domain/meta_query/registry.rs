//! Alias registry
//!
//! Tracks the JOIN aliases and clause names issued during a single compile
//! call. A registry is created per call and dropped with it.

use rustc_hash::FxHashSet;

#[derive(Debug, Default)]
pub struct AliasRegistry {
    aliases: Vec<String>,
    clause_names: FxHashSet<String>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a JOIN alias.
    ///
    /// Returns the resolved alias and whether this is its first use, in
    /// which case the caller must emit the JOIN.
    pub fn register(&mut self, candidate: &str) -> (String, bool) {
        if self.aliases.iter().any(|a| a == candidate) {
            return (candidate.to_string(), false);
        }
        self.aliases.push(candidate.to_string());
        (candidate.to_string(), true)
    }

    /// Issue a clause name derived from `base`, suffixed with `-1`, `-2`, ...
    /// until it does not collide with a name already issued.
    pub fn unique_clause_key(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut iterator = 1;
        while self.clause_names.contains(&name) {
            name = format!("{}-{}", base, iterator);
            iterator += 1;
        }
        self.clause_names.insert(name.clone());
        name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut registry = AliasRegistry::new();
        assert_eq!(registry.register("mirror"), ("mirror".to_string(), true));
        assert_eq!(registry.register("mirror"), ("mirror".to_string(), false));
        assert_eq!(registry.aliases(), ["mirror".to_string()]);
    }

    #[test]
    fn clause_keys_get_numeric_suffixes() {
        let mut registry = AliasRegistry::new();
        assert_eq!(registry.unique_clause_key("mirror"), "mirror");
        assert_eq!(registry.unique_clause_key("mirror"), "mirror-1");
        assert_eq!(registry.unique_clause_key("mirror"), "mirror-2");
        assert_eq!(registry.unique_clause_key("price"), "price");
    }

    #[test]
    fn suffixed_name_already_taken_is_skipped() {
        let mut registry = AliasRegistry::new();
        assert_eq!(registry.unique_clause_key("a-1"), "a-1");
        assert_eq!(registry.unique_clause_key("a"), "a");
        assert_eq!(registry.unique_clause_key("a"), "a-2");
    }
}
