use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Where a port's 8 lines live on a remote I/O module: 8 consecutive coils
/// for driving and 8 consecutive discrete inputs for sensing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PortAddress {
    pub coil: u16,
    pub discrete_input: u16,
}

/// Port number -> register block. TOML keys are the port numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "HashMap<String, PortAddress>")]
pub struct PortMapping {
    ports: BTreeMap<u8, PortAddress>,
}

impl PortMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, port: u8, address: PortAddress) {
        self.ports.insert(port, address);
    }

    pub fn get(&self, port: u8) -> Option<&PortAddress> {
        self.ports.get(&port)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl TryFrom<HashMap<String, PortAddress>> for PortMapping {
    type Error = String;

    fn try_from(table: HashMap<String, PortAddress>) -> Result<Self, Self::Error> {
        let mut mapping = PortMapping::new();
        for (key, address) in table {
            let port = key
                .trim()
                .parse::<u8>()
                .map_err(|_| format!("invalid port number `{key}`"))?;
            mapping.insert(port, address);
        }
        Ok(mapping)
    }
}
