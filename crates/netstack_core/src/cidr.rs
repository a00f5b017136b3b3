//! IPv4 CIDR blocks and subnet carving.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{StackError, StackResult};

/// Smallest subnet the carving allocator hands out.
pub const MAX_SUBNET_PREFIX: u8 = 28;

/// An IPv4 network in CIDR notation, e.g. `10.0.0.0/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(network: Ipv4Addr, prefix: u8) -> StackResult<Self> {
        if prefix > 32 {
            return Err(StackError::InvalidConfig(format!(
                "CIDR prefix /{} is out of range",
                prefix
            )));
        }
        let cidr = Self { network, prefix };
        if u32::from(network) & !cidr.mask() != 0 {
            return Err(StackError::InvalidConfig(format!(
                "{}/{} has host bits set",
                network, prefix
            )));
        }
        Ok(cidr)
    }

    /// `0.0.0.0/0`, any IPv4 address.
    pub fn any() -> Self {
        Self {
            network: Ipv4Addr::UNSPECIFIED,
            prefix: 0,
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn is_any(&self) -> bool {
        self.prefix == 0
    }

    /// Number of addresses in the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - self.prefix as u32)
    }

    fn start(&self) -> u64 {
        u32::from(self.network) as u64
    }

    fn end(&self) -> u64 {
        self.start() + self.size()
    }

    fn mask(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix as u32)
        }
    }

    /// Whether `other` lies entirely inside this block.
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.start() >= self.start() && other.end() <= self.end()
    }

    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| StackError::InvalidConfig(format!("'{}' is not in CIDR notation", s)))?;

        let network = addr
            .parse::<Ipv4Addr>()
            .map_err(|e| StackError::InvalidConfig(format!("'{}': {}", s, e)))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|e| StackError::InvalidConfig(format!("'{}': {}", s, e)))?;

        Self::new(network, prefix)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = StackError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Cidr> for String {
    fn from(cidr: Ipv4Cidr) -> Self {
        cidr.to_string()
    }
}

/// Carves consecutive, mask-aligned subnets out of a parent block.
#[derive(Debug, Clone)]
pub struct CidrAllocator {
    block: Ipv4Cidr,
    cursor: u64,
}

impl CidrAllocator {
    pub fn new(block: Ipv4Cidr) -> Self {
        Self {
            block,
            cursor: block.start(),
        }
    }

    /// Allocate the next free `/prefix` block.
    pub fn allocate(&mut self, prefix: u8) -> StackResult<Ipv4Cidr> {
        if prefix < self.block.prefix || prefix > MAX_SUBNET_PREFIX {
            return Err(StackError::InvalidConfig(format!(
                "subnet mask /{} must be between /{} and /{}",
                prefix, self.block.prefix, MAX_SUBNET_PREFIX
            )));
        }

        let size = 1u64 << (32 - prefix as u32);
        let start = self.cursor.div_ceil(size) * size;
        if start + size > self.block.end() {
            return Err(StackError::InvalidConfig(format!(
                "no room left in {} for a /{} subnet",
                self.block, prefix
            )));
        }

        self.cursor = start + size;
        Ipv4Cidr::new(Ipv4Addr::from(start as u32), prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let cidr: Ipv4Cidr = "10.0.0.0/16".parse().unwrap();
        assert_eq!(cidr.prefix(), 16);
        assert_eq!(cidr.size(), 65536);
        assert_eq!(cidr.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn test_rejects_host_bits_and_garbage() {
        assert!("10.0.0.1/16".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0/33".parse::<Ipv4Cidr>().is_err());
        assert!("ten/8".parse::<Ipv4Cidr>().is_err());
    }

    #[test]
    fn test_allocator_is_sequential() {
        let mut alloc = CidrAllocator::new("10.0.0.0/16".parse().unwrap());
        assert_eq!(alloc.allocate(24).unwrap().to_string(), "10.0.0.0/24");
        assert_eq!(alloc.allocate(24).unwrap().to_string(), "10.0.1.0/24");
        assert_eq!(alloc.allocate(28).unwrap().to_string(), "10.0.2.0/28");
        // realigns to the next /24 boundary
        assert_eq!(alloc.allocate(24).unwrap().to_string(), "10.0.3.0/24");
    }

    #[test]
    fn test_allocator_exhaustion() {
        let mut alloc = CidrAllocator::new("10.0.0.0/23".parse().unwrap());
        alloc.allocate(24).unwrap();
        alloc.allocate(24).unwrap();
        assert!(alloc.allocate(24).is_err());
    }

    #[test]
    fn test_allocator_rejects_masks_outside_block() {
        let mut alloc = CidrAllocator::new("10.0.0.0/16".parse().unwrap());
        assert!(alloc.allocate(8).is_err());
        assert!(alloc.allocate(30).is_err());
    }

    #[test]
    fn test_contains_and_overlaps() {
        let vpc: Ipv4Cidr = "10.0.0.0/16".parse().unwrap();
        let sub: Ipv4Cidr = "10.0.4.0/24".parse().unwrap();
        let other: Ipv4Cidr = "10.1.0.0/24".parse().unwrap();
        assert!(vpc.contains(&sub));
        assert!(!vpc.contains(&other));
        assert!(vpc.overlaps(&sub));
        assert!(!sub.overlaps(&other));
        assert!(Ipv4Cidr::any().is_any());
    }
}
