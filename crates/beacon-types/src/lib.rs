//! Shared types for Beacon.
//!
//! This crate defines the vocabulary shared across the Beacon workspace:
//! the peer category token ([`PeerType`]), member metadata ([`Tags`],
//! [`PeerInfo`]), the membership source's member representation
//! ([`Member`], [`Peer`]) and the events it emits ([`ClusterEvent`],
//! [`MemberEventKind`], [`EventBus`]).

mod error;
pub mod events;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use error::TypesError;
pub use events::{EventBus, EventReceiver};

/// Arbitrary string metadata attached to a member.
pub type Tags = BTreeMap<String, String>;

/// Tag key carrying a member's encoded [`PeerType`].
pub const PEER_TYPE_TAG: &str = "peer_type";

/// Maximum length of a peer type token.
const MAX_PEER_TYPE_LEN: usize = 64;

// ---------------------------------------------------------------------------
// PeerType
// ---------------------------------------------------------------------------

/// The category a peer belongs to (e.g. `"worker"`, `"store"`).
///
/// Every category gets its own hash ring in the registry. Tokens are
/// validated on parse: 1 to 64 characters drawn from lowercase ASCII
/// letters, digits, `-`, `_`, `.` and `:`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerType(String);

impl PeerType {
    /// Category assigned to members that did not advertise one.
    pub const UNKNOWN: &'static str = "peertype:unknown";

    /// Parse and validate a peer type token.
    pub fn parse(s: &str) -> Result<Self, TypesError> {
        let valid = !s.is_empty()
            && s.len() <= MAX_PEER_TYPE_LEN
            && s.bytes().all(|b| {
                b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'-' | b'_' | b'.' | b':')
            });
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(TypesError::InvalidPeerType(s.to_string()))
        }
    }

    /// The [`PeerType::UNKNOWN`] category.
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Return the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PeerType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PeerType {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PeerType> for String {
    fn from(p: PeerType) -> Self {
        p.0
    }
}

impl AsRef<str> for PeerType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PeerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerType({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// A node as reported by the membership source.
pub trait Member {
    /// Name of the member, unique within its address.
    fn name(&self) -> &str;

    /// Network location (`host:port`) of the member.
    fn address(&self) -> &str;

    /// The category the member belongs to.
    fn peer_type(&self) -> &PeerType;

    /// Metadata advertised by the member.
    fn tags(&self) -> &Tags;
}

/// A concrete cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Member name.
    pub name: String,
    /// `host:port` the member is reachable on.
    pub address: String,
    /// The member's category.
    pub peer_type: PeerType,
    /// Advertised metadata.
    #[serde(default)]
    pub tags: Tags,
}

impl Peer {
    /// Create a member with no tags.
    pub fn new(name: impl Into<String>, address: impl Into<String>, peer_type: PeerType) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            peer_type,
            tags: Tags::new(),
        }
    }

    /// Attach tags to the member, replacing any existing ones.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Build a member from a gossip node's name, address and tags.
    ///
    /// The category is read from the [`PEER_TYPE_TAG`] tag. Nodes that do
    /// not advertise one are filed under [`PeerType::UNKNOWN`].
    pub fn from_node_tags(
        name: impl Into<String>,
        address: impl Into<String>,
        tags: Tags,
    ) -> Result<Self, TypesError> {
        let peer_type = match tags.get(PEER_TYPE_TAG) {
            Some(t) => PeerType::parse(t)?,
            None => PeerType::unknown(),
        };
        Ok(Self {
            name: name.into(),
            address: address.into(),
            peer_type,
            tags,
        })
    }
}

impl Member for Peer {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn peer_type(&self) -> &PeerType {
        &self.peer_type
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

/// Identity and API location a node advertises through its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Node name.
    pub name: String,
    /// Node category.
    pub peer_type: PeerType,
    /// Address the node's API listens on.
    pub api_addr: String,
    /// Port the node's API listens on.
    pub api_port: u16,
}

impl PeerInfo {
    /// Encode into the tag set advertised over gossip.
    pub fn encode_tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert("name".to_string(), self.name.clone());
        tags.insert(PEER_TYPE_TAG.to_string(), self.peer_type.to_string());
        tags.insert("api_addr".to_string(), self.api_addr.clone());
        tags.insert("api_port".to_string(), self.api_port.to_string());
        tags
    }

    /// Decode from a member's tag set.
    pub fn decode_tags(tags: &Tags) -> Result<Self, TypesError> {
        let name = tags.get("name").ok_or(TypesError::MissingTag("name"))?;
        let peer_type = tags
            .get(PEER_TYPE_TAG)
            .ok_or(TypesError::MissingTag(PEER_TYPE_TAG))?;
        let peer_type = PeerType::parse(peer_type)?;
        let api_port = tags
            .get("api_port")
            .ok_or(TypesError::MissingTag("api_port"))?;
        let api_port = api_port.parse().map_err(|_| TypesError::InvalidTag {
            tag: "api_port",
            value: api_port.clone(),
        })?;
        let api_addr = tags
            .get("api_addr")
            .ok_or(TypesError::MissingTag("api_addr"))?;

        Ok(Self {
            name: name.clone(),
            peer_type,
            api_addr: api_addr.clone(),
            api_port,
        })
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What happened to the members carried by a [`ClusterEvent::Member`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberEventKind {
    /// Members joined the cluster.
    Joined,
    /// Members left gracefully.
    Left,
    /// Members changed their advertised metadata.
    Updated,
    /// Members were declared failed by the failure detector.
    Failed,
    /// Failed members were reaped from the member list.
    Reaped,
}

/// Events delivered by the membership source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterEvent {
    /// A batch of members changed state.
    Member {
        /// The kind of change.
        kind: MemberEventKind,
        /// The affected members.
        members: Vec<Peer>,
    },
    /// An application-defined event.
    User {
        /// Event name.
        name: String,
        /// Opaque payload.
        payload: Vec<u8>,
    },
}

impl ClusterEvent {
    /// Shorthand for a member event.
    pub fn member(kind: MemberEventKind, members: Vec<Peer>) -> Self {
        Self::Member { kind, members }
    }
}
