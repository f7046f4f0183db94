// src/core/model/protocol.rs
use std::collections::HashSet;
use std::fmt;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ThreatflowError};
use super::registry::{EntityId, Registry};

/// Fixed-profile transport and security protocol presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Plaintext,
    Dhcp,
    Exec,
    Tcp,
    TcpForwarded,
    Stdout,
    Internal,
    Unknown,
    Jws,
    Ipsec,
    TlsVpn,
    Mtls,
    MtlsVpn,
    Ssh,
    Chime,
    Git,
    Sql,
    Tls,
    Sigv4,
    HttpBasicAuth,
    Http,
}

impl Protocol {
    pub const ALL: [Protocol; 21] = [
        Protocol::Plaintext,
        Protocol::Dhcp,
        Protocol::Exec,
        Protocol::Tcp,
        Protocol::TcpForwarded,
        Protocol::Stdout,
        Protocol::Internal,
        Protocol::Unknown,
        Protocol::Jws,
        Protocol::Ipsec,
        Protocol::TlsVpn,
        Protocol::Mtls,
        Protocol::MtlsVpn,
        Protocol::Ssh,
        Protocol::Chime,
        Protocol::Git,
        Protocol::Sql,
        Protocol::Tls,
        Protocol::Sigv4,
        Protocol::HttpBasicAuth,
        Protocol::Http,
    ];

    /// Display name used in chain descriptions and diagrams
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Plaintext => "Plaintext",
            Protocol::Dhcp => "DHCP",
            Protocol::Exec => "Exec",
            Protocol::Tcp => "TCP",
            Protocol::TcpForwarded => "TCPForwarded",
            Protocol::Stdout => "Stdout",
            Protocol::Internal => "Internal",
            Protocol::Unknown => "Unknown",
            Protocol::Jws => "JWS",
            Protocol::Ipsec => "IPSEC",
            Protocol::TlsVpn => "TLSVPN",
            Protocol::Mtls => "MTLS",
            Protocol::MtlsVpn => "MTLSVPN",
            Protocol::Ssh => "SSH",
            Protocol::Chime => "Chime",
            Protocol::Git => "GIT",
            Protocol::Sql => "SQL",
            Protocol::Tls => "TLS",
            Protocol::Sigv4 => "SIGV4",
            Protocol::HttpBasicAuth => "HTTPBasicAuth",
            Protocol::Http => "HTTP",
        }
    }

    /// Case-insensitive lookup by display name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
    }

    /// The security properties this preset declares
    pub fn profile(&self) -> ProtocolProfile {
        let base = ProtocolProfile::default();
        match self {
            Protocol::Plaintext
            | Protocol::Dhcp
            | Protocol::Exec
            | Protocol::Tcp
            | Protocol::TcpForwarded
            | Protocol::Stdout
            | Protocol::Internal
            | Protocol::Unknown
            | Protocol::Jws
            | Protocol::Git => base,
            Protocol::Ipsec | Protocol::Mtls | Protocol::MtlsVpn => ProtocolProfile {
                encrypted: true,
                server_authenticated: true,
                client_authenticated: true,
                server_credential: Some("x509".to_string()),
                client_credential: Some("x509".to_string()),
                ..base
            },
            Protocol::TlsVpn => ProtocolProfile {
                encrypted: true,
                server_authenticated: true,
                server_credential: Some("x509".to_string()),
                ..base
            },
            Protocol::Ssh => ProtocolProfile {
                encrypted: true,
                signed: true,
                server_authenticated: true,
                server_credential: Some("ssh-rsa".to_string()),
                version: Some("2".to_string()),
                ..base
            },
            Protocol::Chime => ProtocolProfile {
                server_authenticated: true,
                server_credential: Some("Federated App".to_string()),
                ..base
            },
            Protocol::Sql => ProtocolProfile {
                client_authenticated: true,
                server_credential: Some("Username/Password".to_string()),
                version: Some("0".to_string()),
                ..base
            },
            Protocol::Tls => ProtocolProfile {
                encrypted: true,
                server_authenticated: true,
                server_credential: Some("x509".to_string()),
                version: Some("1.2".to_string()),
                ..base
            },
            Protocol::Sigv4 => ProtocolProfile {
                signed: true,
                client_credential: Some("rsa".to_string()),
                ..base
            },
            Protocol::HttpBasicAuth => ProtocolProfile {
                client_authenticated: true,
                server_credential: Some("HTTP Basic Auth".to_string()),
                client_credential: Some("Username / Password".to_string()),
                version: Some("2.0".to_string()),
                ..base
            },
            Protocol::Http => ProtocolProfile {
                version: Some("2.0".to_string()),
                ..base
            },
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Security properties of one protocol layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolProfile {
    pub encrypted: bool,
    pub signed: bool,
    pub server_authenticated: bool,
    pub client_authenticated: bool,
    pub server_credential: Option<String>,
    pub client_credential: Option<String>,
    pub version: Option<String>,
}

/// Handle to a wrapper stored in a [`WrapperArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WrapperId(usize);

impl WrapperId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What a wrapper wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wrapped {
    Wrapper(WrapperId),
    Payload(EntityId),
}

/// Argument accepted when wrapping: a wrapper, a payload, or a payload name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrapTarget {
    Wrapper(WrapperId),
    Payload(EntityId),
    Name(String),
}

impl From<WrapperId> for WrapTarget {
    fn from(id: WrapperId) -> Self {
        WrapTarget::Wrapper(id)
    }
}

impl From<EntityId> for WrapTarget {
    fn from(id: EntityId) -> Self {
        WrapTarget::Payload(id)
    }
}

impl From<&str> for WrapTarget {
    fn from(name: &str) -> Self {
        WrapTarget::Name(name.to_string())
    }
}

impl From<String> for WrapTarget {
    fn from(name: String) -> Self {
        WrapTarget::Name(name)
    }
}

/// One protocol layer around a payload or another layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wrapper {
    pub id: WrapperId,
    pub protocol: Protocol,
    pub profile: ProtocolProfile,
    pub wraps: Wrapped,
    /// Data exchanged alongside the wrapped payload, e.g. during a handshake
    pub protocol_data: Vec<EntityId>,
}

impl fmt::Display for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.protocol, self.id.0)
    }
}

/// Storage for wrapper chains
#[derive(Debug, Clone, Default)]
pub struct WrapperArena {
    nodes: Vec<Wrapper>,
}

impl WrapperArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, protocol: Protocol, wraps: Wrapped) -> WrapperId {
        let id = WrapperId(self.nodes.len());
        self.nodes.push(Wrapper {
            id,
            protocol,
            profile: protocol.profile(),
            wraps,
            protocol_data: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: WrapperId) -> &Wrapper {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: WrapperId) -> &mut Wrapper {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Wrapper> {
        self.nodes.iter()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Wrapper layers from outermost to innermost, and the payload they end in
    fn walk(&self, start: WrapperId) -> Result<(Vec<WrapperId>, EntityId)> {
        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        let mut current = start;

        loop {
            if !visited.insert(current) {
                return Err(ThreatflowError::CyclicWrapper {
                    wrapper: self.get(current).to_string(),
                });
            }
            chain.push(current);

            match self.get(current).wraps {
                Wrapped::Wrapper(next) => current = next,
                Wrapped::Payload(payload) => return Ok((chain, payload)),
            }
        }
    }

    pub fn terminal_payload(&self, id: WrapperId) -> Result<EntityId> {
        self.walk(id).map(|(_, payload)| payload)
    }

    pub fn chain_sequence(&self, id: WrapperId) -> Result<Vec<WrapperId>> {
        self.walk(id).map(|(chain, _)| chain)
    }

    /// Flattened representation such as `TLS( HTTP( MEEP ) )`
    pub fn describe(&self, id: WrapperId, registry: &Registry) -> Result<String> {
        let (chain, payload) = self.walk(id)?;
        let mut s = String::new();
        for layer in &chain {
            s.push_str(self.get(*layer).protocol.name());
            s.push_str("( ");
        }
        s.push_str(registry.name(payload));
        s.push_str(&" )".repeat(chain.len()));
        Ok(s)
    }

    /// Graphviz record label showing each layer, its protocol data and the payload
    pub fn record_label(&self, id: WrapperId, registry: &Registry) -> Result<String> {
        let (chain, payload) = self.walk(id)?;
        let mut fields = Vec::new();

        for layer in &chain {
            let wrapper = self.get(*layer);
            let mut field = escape_record(wrapper.protocol.name());
            if let Some(version) = &wrapper.profile.version {
                field.push_str(&format!(" v{}", escape_record(version)));
            }
            fields.push(field);

            if !wrapper.protocol_data.is_empty() {
                let data: Vec<String> = wrapper
                    .protocol_data
                    .iter()
                    .map(|d| escape_record(registry.name(*d)))
                    .collect();
                fields.push(format!("{{{}}}", data.join("|")));
            }
        }

        fields.push(format!("{{{}}}", escape_record(registry.name(payload))));
        Ok(fields.join("|"))
    }

    /// Point `id` at a new inner layer, refusing to close a loop
    pub fn rewrap(&mut self, id: WrapperId, wraps: Wrapped) -> Result<()> {
        if let Wrapped::Wrapper(inner) = wraps {
            let reaches_self = inner == id || self.chain_sequence(inner)?.contains(&id);
            if reaches_self {
                return Err(ThreatflowError::CyclicWrapper {
                    wrapper: self.get(id).to_string(),
                });
            }
        }
        self.nodes[id.0].wraps = wraps;
        Ok(())
    }
}

/// Escape record syntax and DOT string syntax; the result goes between quotes as is
fn escape_record(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '{' | '}' | '|' | '<' | '>' | '\\' | '"' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::registry::EntityKind;

    fn tls_http_meep() -> (Registry, WrapperArena, WrapperId, EntityId) {
        let mut registry = Registry::new();
        let mut arena = WrapperArena::new();
        let meep = registry.register(EntityKind::Data, "MEEP");
        let http = arena.push(Protocol::Http, Wrapped::Payload(meep));
        let tls = arena.push(Protocol::Tls, Wrapped::Wrapper(http));
        (registry, arena, tls, meep)
    }

    #[test]
    fn test_chain_terminates_in_original_payload() {
        let (_, arena, tls, meep) = tls_http_meep();

        assert_eq!(arena.terminal_payload(tls).unwrap(), meep);
        assert_eq!(arena.chain_sequence(tls).unwrap().len(), 2);
    }

    #[test]
    fn test_describe_nests_one_level_per_wrapper() {
        let (registry, arena, tls, _) = tls_http_meep();
        assert_eq!(arena.describe(tls, &registry).unwrap(), "TLS( HTTP( MEEP ) )");
    }

    #[test]
    fn test_record_label_includes_versions_and_protocol_data() {
        let (mut registry, mut arena, tls, _) = tls_http_meep();
        let key = registry.register(EntityKind::Data, "Session Key");
        arena.get_mut(tls).protocol_data.push(key);

        assert_eq!(
            arena.record_label(tls, &registry).unwrap(),
            "TLS v1.2|{Session Key}|HTTP v2.0|{MEEP}"
        );
    }

    #[test]
    fn test_record_label_escapes_dot_string_syntax() {
        let mut registry = Registry::new();
        let mut arena = WrapperArena::new();
        let share = registry.register(EntityKind::Data, "\\\\host\\C$ \"{x}\"");
        let smb = arena.push(Protocol::Tcp, Wrapped::Payload(share));

        assert_eq!(
            arena.record_label(smb, &registry).unwrap(),
            "TCP|{\\\\\\\\host\\\\C$ \\\"\\{x\\}\\\"}"
        );
    }

    #[test]
    fn test_rewrap_refuses_cycles() {
        let (_, mut arena, tls, _) = tls_http_meep();
        let http = arena.chain_sequence(tls).unwrap()[1];

        let err = arena.rewrap(http, Wrapped::Wrapper(tls)).unwrap_err();
        assert!(matches!(err, ThreatflowError::CyclicWrapper { .. }));
        assert!(arena.rewrap(tls, Wrapped::Wrapper(tls)).is_err());
    }

    #[test]
    fn test_traversal_detects_cycles_it_did_not_create() {
        let (_, mut arena, tls, _) = tls_http_meep();
        let http = arena.chain_sequence(tls).unwrap()[1];
        arena.get_mut(http).wraps = Wrapped::Wrapper(tls);

        assert!(matches!(
            arena.terminal_payload(tls),
            Err(ThreatflowError::CyclicWrapper { .. })
        ));
    }

    #[test]
    fn test_preset_profiles() {
        let tls = Protocol::Tls.profile();
        assert!(tls.encrypted && tls.server_authenticated && !tls.client_authenticated);
        assert_eq!(tls.version.as_deref(), Some("1.2"));

        let mtls = Protocol::Mtls.profile();
        assert!(mtls.client_authenticated);
        assert_eq!(mtls.client_credential.as_deref(), Some("x509"));

        assert_eq!(Protocol::Plaintext.profile(), ProtocolProfile::default());
        assert_eq!(Protocol::from_name("httpbasicauth"), Some(Protocol::HttpBasicAuth));
        assert_eq!(Protocol::from_name("carrier pigeon"), None);
    }
}
