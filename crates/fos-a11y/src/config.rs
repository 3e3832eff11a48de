//! Cache configuration
//!
//! Loaded from JSON; every field has a default so an empty object is a
//! valid configuration.

use serde::Deserialize;

use crate::invalidation::{ChangeMap, ChangeRule};
use crate::{A11yError, CacheDomain};

const DEFAULT_IDLE_BATCH_SIZE: usize = 64;

/// Extra or replacement attribute invalidation rule
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AttributeRule {
    /// Attribute name
    pub attribute: String,
    /// Domain names, e.g. `["State", "Actions"]`
    pub domains: Vec<String>,
    /// Whether descendants are invalidated too
    #[serde(default)]
    pub subtree: bool,
}

/// Extra or replacement style property invalidation rule
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StyleRule {
    /// CSS property name
    pub property: String,
    pub domains: Vec<String>,
    #[serde(default)]
    pub subtree: bool,
}

/// Accessibility cache configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Domains populated for every node up front (domain names)
    pub initial_domains: Vec<String>,
    /// Maximum domain computations per idle pass
    pub idle_batch_size: usize,
    /// Recompute invalidated domains that were populated
    pub repopulate_on_invalidate: bool,
    pub attribute_rules: Vec<AttributeRule>,
    pub style_rules: Vec<StyleRule>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            initial_domains: Vec::new(),
            idle_batch_size: DEFAULT_IDLE_BATCH_SIZE,
            repopulate_on_invalidate: true,
            attribute_rules: Vec::new(),
            style_rules: Vec::new(),
        }
    }
}

impl CacheConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, A11yError> {
        let config: CacheConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every domain name
    pub fn validate(&self) -> Result<(), A11yError> {
        self.initial_domains()?;
        self.change_map()?;
        Ok(())
    }

    /// Initial active domains
    pub fn initial_domains(&self) -> Result<CacheDomain, A11yError> {
        CacheDomain::parse_list(&self.initial_domains)
    }

    /// Idle batch size, at least one
    pub fn batch_size(&self) -> usize {
        self.idle_batch_size.max(1)
    }

    /// Default change table with the configured rules applied
    pub fn change_map(&self) -> Result<ChangeMap, A11yError> {
        let mut map = ChangeMap::default();
        for rule in &self.attribute_rules {
            let domains = CacheDomain::parse_list(&rule.domains)?;
            map.set_attribute_rule(&rule.attribute, ChangeRule { domains, subtree: rule.subtree });
        }
        for rule in &self.style_rules {
            let domains = CacheDomain::parse_list(&rule.domains)?;
            map.set_style_rule(&rule.property, ChangeRule { domains, subtree: rule.subtree });
        }
        Ok(map)
    }
}
