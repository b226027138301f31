//! OFAC SDN list fetching and parsing: a cached download layer over the Treasury
//! XML feed, plus the namespace-tolerant parser that turns it into [`SdnEntry`]
//! records with citations.

mod client;
mod parser;

pub use client::{CacheInfo, OfacClient, UpdateCheck};
pub use parser::{EntityType, SdnCitation, SdnEntry, parse_sdn_xml};
