//! Core entities: domains, devices, categories, and assignments.
//!
//! A *domain* is an isolated virtual machine.  A *device* is a piece of
//! removable hardware exposed by one domain (its *backend*) and optionally
//! attached to another (its *frontend*).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Identifier of a domain, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(String);

impl DomainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of a device.
///
/// Stable for the lifetime of the device: it is derived from the backend
/// domain and the backend-local identifier, formatted `backend:ident`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the identifier from the backend domain and local identifier.
    pub fn from_parts(backend: &DomainId, ident: &str) -> Self {
        Self(format!("{}:{}", backend, ident))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A lookup referenced an id the registry does not know.
///
/// Usually means a stale or duplicated notification; callers log and move on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} not found: {id}")]
pub struct NotFoundError {
    pub kind: &'static str,
    pub id: String,
}

impl NotFoundError {
    pub fn device(id: &DeviceId) -> Self {
        Self {
            kind: "device",
            id: id.to_string(),
        }
    }

    pub fn domain(id: &DomainId) -> Self {
        Self {
            kind: "domain",
            id: id.to_string(),
        }
    }
}

// ── Categories ────────────────────────────────────────────────────────────────

/// Recognised device categories, in their fixed menu order.
///
/// The derived `Ord` follows declaration order, which is the menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Block,
    Usb,
    Mic,
}

/// A device class tag outside the recognised set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognised device category: {0}")]
pub struct UnknownCategory(pub String);

impl Category {
    /// Number of recognised categories.
    pub const COUNT: usize = 3;

    /// All categories in menu order.
    pub const ALL: [Category; Category::COUNT] = [Category::Block, Category::Usb, Category::Mic];

    /// Position of this category in the fixed order (0-based).
    pub fn index(self) -> usize {
        match self {
            Category::Block => 0,
            Category::Usb => 1,
            Category::Mic => 2,
        }
    }

    /// The platform's tag for this category (`"block"`, `"usb"`, `"mic"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Block => "block",
            Category::Usb => "usb",
            Category::Mic => "mic",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(Category::Block),
            "usb" => Ok(Category::Usb),
            "mic" => Ok(Category::Mic),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

// ── Domains ───────────────────────────────────────────────────────────────────

/// Lifecycle state of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomainState {
    Starting,
    Started,
    Halted,
    Failed,
    Unknown,
}

impl DomainState {
    /// `true` for states in which the platform has torn down every attachment.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DomainState::Halted | DomainState::Failed | DomainState::Unknown
        )
    }
}

/// A domain (virtual machine) known to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub name: String,
    pub state: DomainState,
    /// Reference to the domain's colour label; resolved to an icon by the
    /// presentation layer.
    pub label: String,
}

// ── Devices ───────────────────────────────────────────────────────────────────

/// A device as described by the platform, before category validation.
///
/// `category` is the raw class tag; [`crate::DeviceRegistry::add`] turns this
/// into a [`Device`] only when the tag is one of [`Category::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub backend: DomainId,
    pub ident: String,
    pub category: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub frontend: Option<DomainId>,
}

impl DeviceInfo {
    pub fn id(&self) -> DeviceId {
        DeviceId::from_parts(&self.backend, &self.ident)
    }
}

/// A device in a recognised category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: DeviceId,
    pub category: Category,
    pub backend: DomainId,
    pub frontend: Option<DomainId>,
    pub ident: String,
    pub display_name: String,
}

impl Device {
    /// Name shown to the user; falls back to the id when the platform gave none.
    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            self.id.as_str()
        } else {
            &self.display_name
        }
    }

    pub fn assignment_state(&self) -> AssignmentState {
        match &self.frontend {
            Some(domain) => AssignmentState::Attached(domain.clone()),
            None => AssignmentState::Detached,
        }
    }
}

/// Ordering key for device entries within a category.
///
/// Compares by backend domain name first, then by identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    pub domain_name: String,
    pub ident: String,
}

impl SortKey {
    pub fn new(domain_name: impl Into<String>, ident: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            ident: ident.into(),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain_name, self.ident)
    }
}

// ── Assignments ───────────────────────────────────────────────────────────────

/// Attach/detach state of a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentState {
    Detached,
    Attached(DomainId),
}

/// A pending or active attach request: which device goes to which domain.
///
/// Never stored; rebuilt from the device's backend and the chosen target
/// every time it is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub device: DeviceId,
    pub category: Category,
    pub backend: DomainId,
    pub ident: String,
    pub target: DomainId,
}

impl Assignment {
    pub fn new(device: &Device, target: DomainId) -> Self {
        Self {
            device: device.id.clone(),
            category: device.category,
            backend: device.backend.clone(),
            ident: device.ident.clone(),
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_is_derived_from_backend_and_ident() {
        let id = DeviceId::from_parts(&DomainId::new("sys-usb"), "2-1");
        assert_eq!(id.as_str(), "sys-usb:2-1");
    }

    #[test]
    fn test_category_parses_recognised_tags() {
        assert_eq!("block".parse::<Category>(), Ok(Category::Block));
        assert_eq!("usb".parse::<Category>(), Ok(Category::Usb));
        assert_eq!("mic".parse::<Category>(), Ok(Category::Mic));
    }

    #[test]
    fn test_category_rejects_unknown_tag() {
        let result = "pci".parse::<Category>();
        assert_eq!(result, Err(UnknownCategory("pci".to_string())));
    }

    #[test]
    fn test_category_order_matches_index() {
        for (i, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
        assert!(Category::Block < Category::Usb);
        assert!(Category::Usb < Category::Mic);
    }

    #[test]
    fn test_terminal_states() {
        assert!(DomainState::Halted.is_terminal());
        assert!(DomainState::Failed.is_terminal());
        assert!(DomainState::Unknown.is_terminal());
        assert!(!DomainState::Started.is_terminal());
        assert!(!DomainState::Starting.is_terminal());
    }

    #[test]
    fn test_sort_key_orders_by_domain_name_then_ident() {
        let a1 = SortKey::new("a", "1");
        let a2 = SortKey::new("a", "2");
        let b1 = SortKey::new("b", "1");
        assert!(a1 < a2);
        assert!(a2 < b1);
        assert_eq!(a2.to_string(), "a:2");
    }

    #[test]
    fn test_device_name_falls_back_to_id() {
        let device = Device {
            id: DeviceId::new("work:sda"),
            category: Category::Block,
            backend: DomainId::new("work"),
            frontend: None,
            ident: "sda".to_string(),
            display_name: String::new(),
        };
        assert_eq!(device.name(), "work:sda");
        assert_eq!(device.assignment_state(), AssignmentState::Detached);
    }

    #[test]
    fn test_device_info_deserializes_with_defaults() {
        let json = r#"{"backend":"sys-usb","ident":"2-1","category":"usb"}"#;
        let info: DeviceInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.id().as_str(), "sys-usb:2-1");
        assert!(info.frontend.is_none());
        assert!(info.display_name.is_empty());
    }
}
