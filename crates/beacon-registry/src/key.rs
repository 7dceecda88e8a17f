//! Registry keys: the capability set the registry indexes on.

use beacon_types::{Member, Tags};
use serde::{Deserialize, Serialize};

/// Anything the registry can index.
///
/// `category` selects the hash ring, `address` is the unit placed on it,
/// and `name` distinguishes entries sharing an address.
pub trait Key {
    /// Name, unique within an address.
    fn name(&self) -> &str;

    /// The category (peer type) this key is filed under.
    fn category(&self) -> &str;

    /// Network location; the unit hashed onto the ring.
    fn address(&self) -> &str;

    /// Arbitrary metadata.
    fn tags(&self) -> &Tags;
}

/// A stored registry entry.
///
/// Entries are replaced wholesale by `add` and `update`; there is no
/// partial update of individual fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Name, unique within `address`.
    pub name: String,
    /// Category the entry belongs to.
    pub category: String,
    /// Network location.
    pub address: String,
    /// Metadata.
    #[serde(default)]
    pub tags: Tags,
}

impl Entry {
    /// Create an entry with no tags.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            address: address.into(),
            tags: Tags::new(),
        }
    }

    /// Attach tags, replacing any existing ones.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Snapshot any [`Key`] into an owned entry.
    pub fn from_key<K: Key + ?Sized>(key: &K) -> Self {
        Self {
            name: key.name().to_string(),
            category: key.category().to_string(),
            address: key.address().to_string(),
            tags: key.tags().clone(),
        }
    }
}

impl Key for Entry {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

/// Exposes a cluster [`Member`] as a registry [`Key`].
///
/// The member's peer type becomes the key's category.
#[derive(Debug, Clone, Copy)]
pub struct MemberKey<'a, M: ?Sized> {
    member: &'a M,
}

impl<'a, M: Member + ?Sized> MemberKey<'a, M> {
    /// Wrap a member.
    pub fn new(member: &'a M) -> Self {
        Self { member }
    }
}

impl<M: Member + ?Sized> Key for MemberKey<'_, M> {
    fn name(&self) -> &str {
        self.member.name()
    }

    fn category(&self) -> &str {
        self.member.peer_type().as_str()
    }

    fn address(&self) -> &str {
        self.member.address()
    }

    fn tags(&self) -> &Tags {
        self.member.tags()
    }
}
