use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    Service,
    Driver,
    Protocol,
    Client,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Service => "SERV",
            Self::Driver => "DRIV",
            Self::Protocol => "PROT",
            Self::Client => "CLNT",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "SERV" => Some(Self::Service),
            "DRIV" => Some(Self::Driver),
            "PROT" => Some(Self::Protocol),
            "CLNT" => Some(Self::Client),
            _ => None,
        }
    }
}

/// Reference to an actor on the platform bus: a device, a person, a service
/// object such as an incident. Only the canonical representation
/// `<NS>:<group>:<id>` matters to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    namespace: Namespace,
    group: String,
    id: String,
}

impl Address {
    pub fn new(namespace: Namespace, group: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace,
            group: group.into(),
            id: id.into(),
        }
    }

    pub fn platform_service(id: impl fmt::Display, group: &str) -> Self {
        Self::new(Namespace::Service, group, id.to_string())
    }

    pub fn device(id: impl fmt::Display) -> Self {
        Self::new(Namespace::Driver, "dev", id.to_string())
    }

    pub fn person(id: impl fmt::Display) -> Self {
        Self::new(Namespace::Service, "person", id.to_string())
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let mut parts = s.splitn(3, ':');
        let namespace = parts
            .next()
            .and_then(Namespace::from_prefix)
            .ok_or_else(|| DomainError::InvalidAddress(s.to_string()))?;
        let group = parts
            .next()
            .filter(|g| !g.is_empty())
            .ok_or_else(|| DomainError::InvalidAddress(s.to_string()))?;
        let id = parts
            .next()
            .ok_or_else(|| DomainError::InvalidAddress(s.to_string()))?;
        Ok(Self::new(namespace, group, id))
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn representation(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace.prefix(), self.group, self.id)
    }
}

impl FromStr for Address {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn representation_round_trips() {
        let addr = Address::parse("DRIV:dev:6ff3a5ff-4650-4ce9-ab4c-fb8d2a4f3f0c").unwrap();
        assert_eq!(addr.namespace(), Namespace::Driver);
        assert_eq!(addr.group(), "dev");
        assert_eq!(
            addr.representation(),
            "DRIV:dev:6ff3a5ff-4650-4ce9-ab4c-fb8d2a4f3f0c"
        );
    }

    #[test]
    fn id_may_contain_separator() {
        let addr = Address::parse("PROT:ZIGB:ab:cd").unwrap();
        assert_eq!(addr.id(), "ab:cd");
    }

    #[test]
    fn parse_rejects_unknown_namespace() {
        assert_eq!(
            Address::parse("FOO:dev:1"),
            Err(DomainError::InvalidAddress("FOO:dev:1".into()))
        );
    }

    #[test]
    fn parse_rejects_missing_parts() {
        assert!(Address::parse("SERV").is_err());
        assert!(Address::parse("SERV:person").is_err());
        assert!(Address::parse("SERV::1").is_err());
    }
}
