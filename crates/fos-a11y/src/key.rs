//! Cache Keys
//!
//! Fixed table of cacheable attributes: wire id, bridge-facing name and
//! owning domain.

use crate::CacheDomain;

/// Cacheable accessibility attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CacheKey {
    Name = 0,
    Description = 1,
    Value = 2,
    Language = 3,
    TextStyle = 4,
    Required = 5,
    Invalid = 6,
    Checked = 7,
    Selected = 8,
    Focused = 9,
    PosInSet = 10,
    SetSize = 11,
    Level = 12,
    AccessKey = 13,
    PrimaryAction = 14,
    HasLongdesc = 15,
    Display = 16,
    ScrollPosition = 17,
    VisualViewportOffset = 18,
    DomNodeId = 19,
    ClassName = 20,
    Bounds = 21,
}

impl CacheKey {
    /// Every key, in wire order
    pub const ALL: [CacheKey; 22] = [
        Self::Name,
        Self::Description,
        Self::Value,
        Self::Language,
        Self::TextStyle,
        Self::Required,
        Self::Invalid,
        Self::Checked,
        Self::Selected,
        Self::Focused,
        Self::PosInSet,
        Self::SetSize,
        Self::Level,
        Self::AccessKey,
        Self::PrimaryAction,
        Self::HasLongdesc,
        Self::Display,
        Self::ScrollPosition,
        Self::VisualViewportOffset,
        Self::DomNodeId,
        Self::ClassName,
        Self::Bounds,
    ];

    /// Owning domain
    pub const fn domain(self) -> CacheDomain {
        match self {
            Self::Name | Self::Description => CacheDomain::NAME_AND_DESCRIPTION,
            Self::Value => CacheDomain::VALUE,
            Self::Language | Self::TextStyle => CacheDomain::TEXT,
            Self::Required | Self::Invalid | Self::Checked | Self::Selected | Self::Focused => {
                CacheDomain::STATE
            }
            Self::PosInSet | Self::SetSize | Self::Level => CacheDomain::GROUP_INFO,
            Self::AccessKey | Self::PrimaryAction | Self::HasLongdesc => CacheDomain::ACTIONS,
            Self::Display => CacheDomain::STYLE,
            Self::ScrollPosition => CacheDomain::SCROLL_POSITION,
            Self::VisualViewportOffset => CacheDomain::APZ,
            Self::DomNodeId | Self::ClassName => CacheDomain::DOM_NODE_ID_AND_CLASS,
            Self::Bounds => CacheDomain::BOUNDS,
        }
    }

    /// Attribute name exposed to native bridges
    pub const fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Value => "value",
            Self::Language => "language",
            Self::TextStyle => "text-style",
            Self::Required => "required",
            Self::Invalid => "invalid",
            Self::Checked => "checked",
            Self::Selected => "selected",
            Self::Focused => "focused",
            Self::PosInSet => "posinset",
            Self::SetSize => "setsize",
            Self::Level => "level",
            Self::AccessKey => "accesskey",
            Self::PrimaryAction => "action",
            Self::HasLongdesc => "longdesc",
            Self::Display => "display",
            Self::ScrollPosition => "scroll-position",
            Self::VisualViewportOffset => "voffset",
            Self::DomNodeId => "id",
            Self::ClassName => "class",
            Self::Bounds => "bounds",
        }
    }

    /// Wire id
    pub fn wire_id(self) -> u8 {
        self as u8
    }

    /// From wire id
    pub fn from_wire(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Look up by bridge-facing name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Keys whose domain intersects `domain`
    pub fn keys_in(domain: CacheDomain) -> impl Iterator<Item = CacheKey> {
        Self::ALL.into_iter().filter(move |k| domain.intersects(k.domain()))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_ids_match_table_order() {
        for (i, key) in CacheKey::ALL.iter().enumerate() {
            assert_eq!(key.wire_id() as usize, i);
            assert_eq!(CacheKey::from_wire(i as u8), Some(*key));
        }
        assert_eq!(CacheKey::from_wire(CacheKey::ALL.len() as u8), None);
    }

    #[test]
    fn test_each_key_has_single_domain() {
        for key in CacheKey::ALL {
            assert!(key.domain().is_single(), "{key} has {}", key.domain());
        }
    }

    #[test]
    fn test_every_domain_has_keys() {
        for domain in CacheDomain::ALL.domains() {
            assert!(CacheKey::keys_in(domain).next().is_some(), "{domain} is empty");
        }
    }

    #[test]
    fn test_group_info_keys() {
        let keys: Vec<CacheKey> = CacheKey::keys_in(CacheDomain::GROUP_INFO).collect();
        assert_eq!(keys, vec![CacheKey::PosInSet, CacheKey::SetSize, CacheKey::Level]);
        assert_eq!(CacheKey::from_name("voffset"), Some(CacheKey::VisualViewportOffset));
    }
}
