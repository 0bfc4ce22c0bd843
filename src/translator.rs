//! Assignment of unique IPv4 addresses to a genome's nodes.

use std::net::Ipv4Addr;

use rand_distr::Uniform;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::util::rand::Rng;

/// Which of the two observation points a network sits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    #[must_use]
    pub fn random(rng: &mut Rng) -> Side {
        if rng.coin() {
            Side::Right
        } else {
            Side::Left
        }
    }

    const fn bit(self) -> u32 {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

/// An address block: subnets are carved out of the left or right half of the
/// IPv4 space, `mask` prefix bits at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Net {
    mask: u8,
    side: Side,
}

// Randomly generated masks stay inside [8, 24]: wide enough that ten nets
// and a hundred hosts can never exhaust a generated genome's address space,
// while hand-built descriptors may use the full [1, 31].
const RANDOM_MASK_LO: u8 = 8;
const RANDOM_MASK_HI: u8 = 24;

impl Net {
    pub fn new(mask: u8, side: Side) -> Result<Net, TranslateError> {
        if !(1..=31).contains(&mask) {
            return Err(TranslateError::InvalidMask { mask });
        }
        Ok(Net { mask, side })
    }

    #[must_use]
    pub fn random(rng: &mut Rng) -> Net {
        Net {
            mask: rng.sample(&Uniform::new(RANDOM_MASK_LO, RANDOM_MASK_HI + 1)),
            side: Side::random(rng),
        }
    }

    #[must_use]
    pub const fn mask(self) -> u8 {
        self.mask
    }

    #[must_use]
    pub const fn side(self) -> Side {
        self.side
    }

    pub(crate) fn randomize_mask(&mut self, rng: &mut Rng) {
        self.mask = rng.sample(&Uniform::new(RANDOM_MASK_LO, RANDOM_MASK_HI + 1));
    }

    pub(crate) fn randomize_side(&mut self, rng: &mut Rng) {
        self.side = Side::random(rng);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("network mask /{mask} is outside [1, 31]")]
    InvalidMask { mask: u8 },
    #[error("no room for another /{mask} subnet")]
    SubnetsExhausted { mask: u8 },
    #[error("network {net} is out of unique host addresses")]
    AddressExhausted { net: usize },
}

/// Maps a genome's node indices to unique dotted-quad addresses.
///
/// Each network's base address is carved from its side's half of the address
/// space; hosts count up from 1 within the network, skipping host bytes
/// `0x00` and `0xff`. Node entries must reference valid nets (the genome
/// invariant); a duplicate address or an overfull network is an error.
#[derive(Debug, Clone)]
pub struct Translator {
    ips: Vec<Ipv4Addr>,
    sides: Vec<Side>,
    side_of_ip: FxHashMap<Ipv4Addr, Side>,
}

impl Translator {
    pub fn new(nets: &[Net], nodes: &[usize]) -> Result<Translator, TranslateError> {
        let mut subnet_counts: FxHashMap<u8, u32> = FxHashMap::default();
        let mut bases = Vec::with_capacity(nets.len());
        for net in nets {
            let count = subnet_counts.entry(net.mask).or_insert(0);
            if *count >= 1 << (net.mask - 1) {
                return Err(TranslateError::SubnetsExhausted { mask: net.mask });
            }
            bases.push((net.side.bit() << 31) | (*count << (32 - net.mask)));
            *count += 1;
        }

        let mut host_counts = vec![0_u32; nets.len()];
        let mut ips = Vec::with_capacity(nodes.len());
        let mut sides = Vec::with_capacity(nodes.len());
        let mut side_of_ip = FxHashMap::default();
        for &net_index in nodes {
            let net = nets[net_index];
            let capacity = (1_u64 << (32 - net.mask)) - 1;
            let count = &mut host_counts[net_index];
            *count += 1;
            while matches!(*count & 0xff, 0x00 | 0xff) {
                *count += 1;
            }
            if u64::from(*count) > capacity {
                return Err(TranslateError::AddressExhausted { net: net_index });
            }
            let ip = Ipv4Addr::from(bases[net_index] | *count);
            if side_of_ip.insert(ip, net.side).is_some() {
                return Err(TranslateError::AddressExhausted { net: net_index });
            }
            ips.push(ip);
            sides.push(net.side);
        }
        Ok(Translator {
            ips,
            sides,
            side_of_ip,
        })
    }

    /// The address assigned to a node.
    #[must_use]
    pub fn ip(&self, node: usize) -> Ipv4Addr {
        self.ips[node]
    }

    /// The observation point a node sits at.
    #[must_use]
    pub fn side(&self, node: usize) -> Side {
        self.sides[node]
    }

    /// Looks an assigned address back up to its observation point.
    #[must_use]
    pub fn side_of(&self, ip: Ipv4Addr) -> Option<Side> {
        self.side_of_ip.get(&ip).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ips.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }
}
