//! Extrapolation output in the two forms it is persisted in: parent pointers,
//! which need a traceback to become paths, and materialized paths.
use std::{
    collections::{hash_map::Entry, HashMap},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{Asn, Prefix};

/// Extrapolation configuration whose output is being verified.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Variant {
    /// Announcements propagated through the whole graph.
    Full,
    /// Only the origin announcements are seeded and propagated.
    OriginOnly,
    /// Collector announcements seeded without propagation. Control set.
    NoPropagation,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Full, Variant::OriginOnly, Variant::NoPropagation];

    /// Suffix appended to the per-AS extrapolation table name.
    pub fn table_suffix(&self) -> &'static str {
        match self {
            Self::Full => "",
            Self::OriginOnly => "_oo",
            Self::NoPropagation => "_np",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::OriginOnly => "origin_only",
            Self::NoPropagation => "no_propagation",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| format!("unknown variant {s:?}"))
    }
}

/// Composite key of a parent pointer: the AS holding the route, the prefix and
/// the origin the route was announced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointerKey {
    pub asn: Asn,
    pub prefix: Prefix,
    pub origin: Asn,
}

/// Forest of inferred routes, one tree per `(prefix, origin)`, with edges
/// pointing from each AS to the neighbor it received the route from.
#[derive(Debug, Default, Clone)]
pub struct ParentPointerTable {
    parents: HashMap<PointerKey, Asn>,
    origins: HashMap<(Asn, Prefix), Vec<Asn>>,
}

impl ParentPointerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `asn` received `prefix` (originated by `origin`) from
    /// `parent`. The first pointer stored for a key is kept; returns `false` if
    /// the key was already present.
    pub fn insert(&mut self, asn: Asn, prefix: Prefix, origin: Asn, parent: Asn) -> bool {
        match self.parents.entry(PointerKey { asn, prefix, origin }) {
            Entry::Occupied(_) => false,
            Entry::Vacant(e) => {
                e.insert(parent);
                self.origins.entry((asn, prefix)).or_default().push(origin);
                true
            }
        }
    }

    pub fn parent(&self, asn: Asn, prefix: Prefix, origin: Asn) -> Option<Asn> {
        self.parents.get(&PointerKey { asn, prefix, origin }).copied()
    }

    /// Origins for which `asn` holds a route to `prefix`, in insertion order.
    pub fn origins_at(&self, asn: Asn, prefix: Prefix) -> &[Asn] {
        self.origins
            .get(&(asn, prefix))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl FromIterator<((Asn, Prefix, Asn), Asn)> for ParentPointerTable {
    fn from_iter<T: IntoIterator<Item = ((Asn, Prefix, Asn), Asn)>>(iter: T) -> Self {
        let mut table = ParentPointerTable::new();
        for ((asn, prefix, origin), parent) in iter {
            table.insert(asn, prefix, origin, parent);
        }
        table
    }
}

/// Path already resolved by the extrapolation, ordered from the verified AS to
/// the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedPath {
    pub path: Vec<Asn>,
    pub origin: Asn,
    /// Number of origin-side hops that were filled by seeding rather than
    /// propagated.
    pub inference_len: usize,
}

#[derive(Debug, Clone)]
pub enum ExtrapolationSet {
    ParentPointers(ParentPointerTable),
    Materialized(HashMap<Prefix, MaterializedPath>),
}

impl ExtrapolationSet {
    pub fn len(&self) -> usize {
        match self {
            Self::ParentPointers(table) => table.len(),
            Self::Materialized(paths) => paths.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn prefix(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    #[test]
    fn first_pointer_wins() {
        let p = prefix("10.0.0.0/8");
        let mut table = ParentPointerTable::new();

        assert!(table.insert(100, p, 1, 50));
        assert!(!table.insert(100, p, 1, 60));
        assert!(table.insert(100, p, 2, 70));

        assert_eq!(table.parent(100, p, 1), Some(50));
        assert_eq!(table.parent(100, p, 2), Some(70));
        assert_eq!(table.parent(100, p, 3), None);
        assert_eq!(table.origins_at(100, p), &[1, 2]);
        assert_eq!(table.origins_at(50, p), &[] as &[Asn]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn pointers_are_keyed_by_prefix() {
        let table: ParentPointerTable = vec![
            ((100, prefix("10.0.0.0/8"), 1), 50),
            ((100, prefix("10.0.0.0/16"), 1), 60),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.parent(100, prefix("10.0.0.0/8"), 1), Some(50));
        assert_eq!(table.parent(100, prefix("10.0.0.0/16"), 1), Some(60));
    }

    #[test]
    fn variant_names() {
        for v in Variant::ALL {
            assert_eq!(v.name().parse::<Variant>(), Ok(v));
        }
        assert_eq!(Variant::OriginOnly.to_string(), "origin_only");
        assert_eq!(Variant::Full.table_suffix(), "");
        assert!("everything".parse::<Variant>().is_err());
    }

    #[test]
    fn command_line_names_match_display() {
        use clap::ValueEnum;

        for v in Variant::ALL {
            let value = v.to_possible_value().unwrap();
            assert_eq!(value.get_name(), v.name());
        }
        assert_eq!(
            <Variant as ValueEnum>::from_str("origin_only", false),
            Ok(Variant::OriginOnly)
        );
        assert_eq!(
            <Variant as ValueEnum>::from_str("no_propagation", false),
            Ok(Variant::NoPropagation)
        );
        assert!(<Variant as ValueEnum>::from_str("origin-only", false).is_err());
    }
}
