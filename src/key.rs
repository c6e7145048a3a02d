//! Capability keys and cache slot keys.

use std::any::TypeId;
use std::fmt;

/// Identifies a capability: the abstract contract a registered service satisfies.
///
/// Capabilities are type identities. A trait capability such as `dyn Controller`
/// and a concrete service type such as `Config<AppConfig>` both key by their
/// `TypeId`; the type name is carried for diagnostics only.
///
/// # Examples
///
/// ```rust
/// use scopeline::{Key, Controller};
///
/// let controllers = Key::of::<dyn Controller>();
/// assert!(controllers.display_name().contains("Controller"));
/// assert_eq!(controllers.service_name(), None);
///
/// let primary = Key::named::<String>("primary");
/// assert_eq!(primary.service_name(), Some("primary"));
/// assert_ne!(primary, Key::of::<String>());
/// ```
#[derive(Clone, Copy)]
pub enum Key {
    /// Unnamed capability with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Named capability: several independent registrations of one type
    Named(TypeId, &'static str, &'static str),
}

impl Key {
    /// Key for the capability `T` (a trait object or a concrete type).
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Key for the capability `T` registered under `name`.
    #[inline(always)]
    pub fn named<T: ?Sized + 'static>(name: &'static str) -> Self {
        Key::Named(TypeId::of::<T>(), std::any::type_name::<T>(), name)
    }

    /// Get the type or trait name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Named(_, name, _) => name,
        }
    }

    /// Get the service name for named keys, or None for unnamed ones
    pub fn service_name(&self) -> Option<&'static str> {
        match self {
            Key::Type(_, _) => None,
            Key::Named(_, _, name) => Some(name),
        }
    }
}

// TypeId-only comparison; the names are diagnostics
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Named(a, _, name_a), Key::Named(b, _, name_b)) => a == b && name_a == name_b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::Named(id, _, name) => {
                1u8.hash(state);
                id.hash(state);
                name.hash(state);
            }
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Type(_, name) => write!(f, "{}", name),
            Key::Named(_, name, label) => write!(f, "{}[{}]", name, label),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The concrete type standing behind one registration.
#[derive(Clone, Copy, Debug)]
pub struct Concrete {
    pub id: TypeId,
    pub name: &'static str,
}

impl Concrete {
    pub fn of<C: 'static>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
        }
    }
}

impl PartialEq for Concrete {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Concrete {}

impl std::hash::Hash for Concrete {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Cache slot inside a scope: capability plus concrete type.
///
/// Several controllers registered under `dyn Controller` each get their own
/// slot because their concrete types differ.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub capability: Key,
    pub concrete: Concrete,
}

impl SlotKey {
    pub fn new(capability: Key, concrete: Concrete) -> Self {
        Self { capability, concrete }
    }
}

impl fmt::Debug for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as {}", self.concrete.name, self.capability)
    }
}
