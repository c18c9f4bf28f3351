//! AS-level relationship graph built from CAIDA's AS-relationship data, used to
//! judge whether an inferred hop can be explained by known topology.
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use bzip2::read::BzDecoder;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::Asn;

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum RelType {
    CustomerToProvider,
    PeerToPeer,
    ProviderToCustomer,
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot parse ASN: {0}")]
    ParseAsn(#[from] std::num::ParseIntError),
    #[error("{0}")]
    Parse(String),
}

/// Peer and provider-customer relationships between ASes.
///
/// Peer links are stored as a single `PeerToPeer` edge in either direction,
/// provider-customer links as a `ProviderToCustomer` edge from the provider.
#[derive(Debug, Default, Clone)]
pub struct RelationshipGraph {
    pub graph: DiGraph<Asn, RelType>,
    index: HashMap<Asn, NodeIndex>,
}

impl RelationshipGraph {
    pub fn from_edges(edges: Vec<(Asn, Asn, RelType)>) -> Self {
        let mut topo = RelationshipGraph::default();

        for (asn1, asn2, rel) in edges {
            let asn1 = topo.get_or_create(asn1);
            let asn2 = topo.get_or_create(asn2);
            topo.graph.add_edge(asn1, asn2, rel);
        }

        topo
    }

    /// Build the graph from an unordered set of peer pairs and a directed set of
    /// `(provider, customer)` pairs.
    pub fn from_pairs(
        peers: impl IntoIterator<Item = (Asn, Asn)>,
        provider_customers: impl IntoIterator<Item = (Asn, Asn)>,
    ) -> Self {
        let edges = peers
            .into_iter()
            .map(|(asn1, asn2)| (asn1, asn2, RelType::PeerToPeer))
            .chain(
                provider_customers
                    .into_iter()
                    .map(|(provider, customer)| (provider, customer, RelType::ProviderToCustomer)),
            )
            .collect();

        RelationshipGraph::from_edges(edges)
    }

    pub fn from_caida(reader: impl Read) -> Result<Self, TopologyError> {
        let content = reader.bytes().collect::<Result<Vec<u8>, _>>()?;

        let content = String::from_utf8(content).map_err(|e| {
            TopologyError::Parse(format!("invalid UTF-8 in AS relationship file: {}", e))
        })?;

        let edges = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                let fields = line.split('|').collect::<Vec<&str>>();
                if fields.len() < 3 {
                    return Err(TopologyError::Parse(format!(
                        "expected at least 3 fields in {}",
                        line
                    )));
                }
                let asn1 = fields[0].parse::<Asn>()?;
                let asn2 = fields[1].parse::<Asn>()?;
                let rel = fields[2].parse::<i32>()?;

                match rel {
                    // asn1 and asn2 are peers
                    0 => Ok((asn1, asn2, RelType::PeerToPeer)),

                    // asn1 is a provider of asn2
                    -1 => Ok((asn1, asn2, RelType::ProviderToCustomer)),

                    _ => Err(TopologyError::Parse(format!(
                        "unknown relationship type {} in {}",
                        rel, line
                    ))),
                }
            })
            .collect::<Result<Vec<(Asn, Asn, RelType)>, _>>()?;

        Ok(RelationshipGraph::from_edges(edges))
    }

    /// Read a CAIDA AS-relationship file, decompressing it on the fly when the
    /// name ends in `.bz2`.
    pub fn from_caida_file(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let file = BufReader::new(File::open(path)?);
        let topo = if path.extension().map_or(false, |ext| ext == "bz2") {
            RelationshipGraph::from_caida(BzDecoder::new(file))?
        } else {
            RelationshipGraph::from_caida(file)?
        };

        log::info!(
            "Loaded {} ASes and {} relationships from {}",
            topo.graph.node_count(),
            topo.graph.edge_count(),
            path.display()
        );
        Ok(topo)
    }

    fn get_or_create(&mut self, asn: Asn) -> NodeIndex {
        if let Some(index) = self.index.get(&asn) {
            return *index;
        }
        let index = self.graph.add_node(asn);
        self.index.insert(asn, index);
        index
    }

    pub fn index_of(&self, asn: Asn) -> Option<NodeIndex> {
        self.index.get(&asn).copied()
    }

    /// Relationship of the link `asn1 -> asn2`, seen from `asn1`.
    ///
    /// `CustomerToProvider` means `asn1` hands the route up to its provider.
    /// `None` if the link is unknown.
    pub fn relation(&self, asn1: Asn, asn2: Asn) -> Option<RelType> {
        let (a, b) = (self.index_of(asn1)?, self.index_of(asn2)?);

        if let Some(edge) = self.graph.find_edge(a, b) {
            return Some(self.graph[edge]);
        }
        let edge = self.graph.find_edge(b, a)?;
        Some(match self.graph[edge] {
            RelType::CustomerToProvider => RelType::ProviderToCustomer,
            RelType::PeerToPeer => RelType::PeerToPeer,
            RelType::ProviderToCustomer => RelType::CustomerToProvider,
        })
    }

    /// Whether the link between `asn1` and `asn2` is a known peering or a
    /// provider-customer relation in either direction.
    pub fn explains(&self, asn1: Asn, asn2: Asn) -> bool {
        self.relation(asn1, asn2).is_some()
    }
}
