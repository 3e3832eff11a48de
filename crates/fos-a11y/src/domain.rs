//! Cache Domains
//!
//! Coarse invalidation groups. Every [`CacheKey`](crate::CacheKey) lives in
//! exactly one domain, and invalidation always clears whole domains.

use bitflags::bitflags;

use crate::A11yError;

bitflags! {
    /// Set of cache domains.
    #[derive(Clone, Copy, Default, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
    pub struct CacheDomain: u32 {
        /// Accessible name and description
        const NAME_AND_DESCRIPTION = 1 << 0;
        /// Current value of form controls and ranges
        const VALUE = 1 << 1;
        /// Language and text style
        const TEXT = 1 << 2;
        /// Required/invalid/checked/selected/focused states
        const STATE = 1 << 3;
        /// Position in set, set size, level
        const GROUP_INFO = 1 << 4;
        /// Access key, primary action, longdesc
        const ACTIONS = 1 << 5;
        /// CSS display
        const STYLE = 1 << 6;
        /// Element scroll offsets
        const SCROLL_POSITION = 1 << 7;
        /// Visual viewport offset (top-level document root only)
        const APZ = 1 << 8;
        /// DOM id and class attributes
        const DOM_NODE_ID_AND_CLASS = 1 << 9;
        /// Layout bounds
        const BOUNDS = 1 << 10;
    }
}

const NAMES: &[(CacheDomain, &str)] = &[
    (CacheDomain::NAME_AND_DESCRIPTION, "NameAndDescription"),
    (CacheDomain::VALUE, "Value"),
    (CacheDomain::TEXT, "Text"),
    (CacheDomain::STATE, "State"),
    (CacheDomain::GROUP_INFO, "GroupInfo"),
    (CacheDomain::ACTIONS, "Actions"),
    (CacheDomain::STYLE, "Style"),
    (CacheDomain::SCROLL_POSITION, "ScrollPosition"),
    (CacheDomain::APZ, "APZ"),
    (CacheDomain::DOM_NODE_ID_AND_CLASS, "DOMNodeIDAndClass"),
    (CacheDomain::BOUNDS, "Bounds"),
];

impl CacheDomain {
    /// No domains
    pub const NONE: CacheDomain = CacheDomain::empty();
    /// Every domain
    pub const ALL: CacheDomain = CacheDomain::all();

    /// Iterate over the single-domain bits of this set
    pub fn domains(self) -> impl Iterator<Item = CacheDomain> {
        self.iter()
    }

    /// Is this exactly one domain?
    pub fn is_single(self) -> bool {
        self.bits().count_ones() == 1
    }

    /// Name of a single domain
    pub fn name(self) -> Option<&'static str> {
        NAMES.iter().find(|(d, _)| *d == self).map(|(_, n)| *n)
    }

    /// Parse a single domain name, `"None"` or `"All"`
    pub fn parse(name: &str) -> Result<CacheDomain, A11yError> {
        match name {
            "None" => return Ok(CacheDomain::NONE),
            "All" => return Ok(CacheDomain::ALL),
            _ => {}
        }
        NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(d, _)| *d)
            .ok_or_else(|| A11yError::UnknownDomain(name.to_string()))
    }

    /// Parse and union a list of domain names
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<CacheDomain, A11yError> {
        names
            .iter()
            .try_fold(CacheDomain::NONE, |acc, n| -> Result<CacheDomain, A11yError> {
                Ok(acc | CacheDomain::parse(n.as_ref())?)
            })
    }
}

impl std::fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "None");
        }
        let mut first = true;
        for domain in self.domains() {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{}", domain.name().unwrap_or("?"))?;
            first = false;
        }
        Ok(())
    }
}
