//! Check reports.
//!
//! A partials report nests pair records under their owning component; a
//! totals report is flat, keyed by (response, design variable) pairs in the
//! model namespace. Both are plain data: every measured discrepancy is
//! preserved so callers can apply their own tolerances.

use std::collections::BTreeMap;
use std::fmt;

use deriv_core::types::PairKey;

use crate::compare::PairCheck;

/// Results of a partial-derivative check, by component then pair.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartialsReport {
    #[cfg_attr(feature = "serde", serde(with = "component_map_serde"))]
    components: BTreeMap<String, BTreeMap<PairKey, PairCheck>>,
}

impl PartialsReport {
    /// An empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one pair record under a component.
    pub fn insert(&mut self, component: impl Into<String>, pair: PairKey, check: PairCheck) {
        self.components
            .entry(component.into())
            .or_default()
            .insert(pair, check);
    }

    /// The records for one component.
    pub fn component(&self, name: &str) -> Option<&BTreeMap<PairKey, PairCheck>> {
        self.components.get(name)
    }

    /// One pair record.
    pub fn pair(&self, component: &str, of: &str, wrt: &str) -> Option<&PairCheck> {
        self.components
            .get(component)?
            .get(&PairKey::new(of, wrt))
    }

    /// Iterates `(component, pair, record)` in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PairKey, &PairCheck)> {
        self.components.iter().flat_map(|(comp, pairs)| {
            pairs
                .iter()
                .map(move |(pair, check)| (comp.as_str(), pair, check))
        })
    }

    /// Number of pair records across all components.
    pub fn len(&self) -> usize {
        self.components.values().map(BTreeMap::len).sum()
    }

    /// Whether no pair was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The largest relative discrepancy across every record, with its
    /// location.
    pub fn worst_rel(&self) -> Option<(&str, &PairKey, f64)> {
        self.iter()
            .filter_map(|(comp, pair, check)| check.worst_rel().map(|r| (comp, pair, r)))
            .fold(None, |acc, cur| match acc {
                Some((_, _, best)) if best >= cur.2 => acc,
                _ => Some(cur),
            })
    }
}

impl fmt::Display for PartialsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (comp, pairs) in &self.components {
            writeln!(f, "Component: {comp}")?;
            for (pair, check) in pairs {
                write_pair(f, pair, check)?;
            }
        }
        Ok(())
    }
}

/// Results of a total-derivative check, keyed by (response, design variable).
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TotalsReport {
    #[cfg_attr(feature = "serde", serde(with = "pair_map_serde"))]
    pairs: BTreeMap<PairKey, PairCheck>,
}

impl TotalsReport {
    /// An empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one pair record.
    pub fn insert(&mut self, pair: PairKey, check: PairCheck) {
        self.pairs.insert(pair, check);
    }

    /// One pair record.
    pub fn pair(&self, of: &str, wrt: &str) -> Option<&PairCheck> {
        self.pairs.get(&PairKey::new(of, wrt))
    }

    /// Iterates `(pair, record)` in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &PairCheck)> {
        self.pairs.iter()
    }

    /// Number of pair records.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair was recorded.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The largest relative discrepancy across every record.
    pub fn worst_rel(&self) -> Option<(&PairKey, f64)> {
        self.pairs
            .iter()
            .filter_map(|(pair, check)| check.worst_rel().map(|r| (pair, r)))
            .fold(None, |acc, cur| match acc {
                Some((_, best)) if best >= cur.1 => acc,
                _ => Some(cur),
            })
    }
}

impl fmt::Display for TotalsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total derivatives")?;
        for (pair, check) in &self.pairs {
            write_pair(f, pair, check)?;
        }
        Ok(())
    }
}

/// Pair-keyed maps serialize as entry sequences: pair keys are structured
/// values, and self-describing formats only accept string map keys.
#[cfg(feature = "serde")]
mod pair_map_serde {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use deriv_core::types::PairKey;

    use crate::compare::PairCheck;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<PairKey, PairCheck>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<PairKey, PairCheck>, D::Error> {
        let entries = Vec::<(PairKey, PairCheck)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

#[cfg(feature = "serde")]
mod component_map_serde {
    use std::collections::BTreeMap;

    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    use deriv_core::types::PairKey;

    use crate::compare::PairCheck;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, BTreeMap<PairKey, PairCheck>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (component, pairs) in map {
            let entries: Vec<(&PairKey, &PairCheck)> = pairs.iter().collect();
            out.serialize_entry(component, &entries)?;
        }
        out.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, BTreeMap<PairKey, PairCheck>>, D::Error> {
        let raw = BTreeMap::<String, Vec<(PairKey, PairCheck)>>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(component, pairs)| (component, pairs.into_iter().collect()))
            .collect())
    }
}

fn write_pair(f: &mut fmt::Formatter<'_>, pair: &PairKey, check: &PairCheck) -> fmt::Result {
    writeln!(f, "  {pair}")?;
    if let Some(mag) = check.magnitude.fwd {
        writeln!(f, "    fwd magnitude:     {mag:.6e}")?;
    }
    if let Some(mag) = check.magnitude.rev {
        writeln!(f, "    rev magnitude:     {mag:.6e}")?;
    }
    writeln!(f, "    approx magnitude:  {:.6e}", check.magnitude.approx)?;
    let modes = [
        ("fwd - approx", check.abs_error.forward, check.rel_error.forward),
        ("rev - approx", check.abs_error.reverse, check.rel_error.reverse),
        (
            "fwd - rev",
            check.abs_error.forward_reverse,
            check.rel_error.forward_reverse,
        ),
    ];
    for (label, abs, rel) in modes {
        if let Some(abs) = abs {
            match rel {
                Some(rel) => {
                    writeln!(f, "    {label}: abs {abs:.6e}, rel {rel:.6e}")?
                }
                None => writeln!(f, "    {label}: abs {abs:.6e}, rel undefined")?,
            }
        }
    }
    Ok(())
}
