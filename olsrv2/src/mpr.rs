//! MPR selection (RFC 7181 §18 and Appendix B).
//!
//! A neighbor `x` covers a 2-hop address `y` when the path through `x` is
//! one of the shortest 2-hop paths to `y`. The selection keeps every
//! ALWAYS neighbor, then every sole cover, then picks greedily by the
//! configured criterion until all of the 2-hop addresses are covered. Ties
//! go to the higher willingness, then to the lowest address.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    net::Ipv4Addr,
};

use crate::constants::{WILL_ALWAYS, WILL_NEVER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    /// The most uncovered 2-hop addresses.
    Degree,
    /// The most uncovered 2-hop addresses, then the cheapest link.
    DegreeOrMetric,
    /// The lowest path metric per newly covered address.
    MetricPerDegree,
}

/// A symmetric neighbor, known by its originator address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: Ipv4Addr,
    pub willingness: u8,
    /// The metric of the link to the neighbor.
    pub metric: u32,
}

/// A 2-hop address reported by a neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coverage {
    pub via: Ipv4Addr,
    pub two_hop: Ipv4Addr,
    /// The metric from the neighbor to the 2-hop address.
    pub metric: u32,
}

/// Selects flooding MPRs.
pub fn select(candidates: &[Candidate], coverage: &[Coverage], criterion: Criterion) -> BTreeSet<Ipv4Addr> {
    let candidates: BTreeMap<Ipv4Addr, Candidate> = candidates
        .iter()
        .filter(|candidate| candidate.willingness != WILL_NEVER)
        .map(|candidate| (candidate.id, *candidate))
        .collect();

    let mut paths: Vec<(Ipv4Addr, Ipv4Addr, u32)> = coverage
        .iter()
        .filter_map(|cover| {
            let candidate = candidates.get(&cover.via)?;
            Some((cover.via, cover.two_hop, candidate.metric.saturating_add(cover.metric)))
        })
        .collect();
    let best = shortest(&paths);
    paths.retain(|(_, two_hop, metric)| best.get(two_hop) == Some(metric));

    let mut selected: BTreeSet<Ipv4Addr> = candidates
        .values()
        .filter(|candidate| candidate.willingness == WILL_ALWAYS)
        .map(|candidate| candidate.id)
        .collect();

    for two_hop in best.keys() {
        let mut covers = paths.iter().filter(|(_, target, _)| target == two_hop);
        if let (Some((via, _, _)), None) = (covers.next(), covers.next()) {
            selected.insert(*via);
        }
    }

    loop {
        let uncovered: BTreeSet<Ipv4Addr> = best
            .keys()
            .filter(|two_hop| {
                !paths
                    .iter()
                    .any(|(via, target, _)| target == *two_hop && selected.contains(via))
            })
            .copied()
            .collect();
        if uncovered.is_empty() {
            break;
        }

        let mut scores: Vec<Score> = candidates
            .values()
            .filter(|candidate| !selected.contains(&candidate.id))
            .map(|candidate| {
                let mut score = Score {
                    candidate: *candidate,
                    degree: 0,
                    cost: 0,
                };
                for (_, target, metric) in paths.iter().filter(|(via, _, _)| *via == candidate.id) {
                    if uncovered.contains(target) {
                        score.degree += 1;
                        score.cost += u64::from(*metric);
                    }
                }
                score
            })
            .filter(|score| score.degree > 0)
            .collect();
        scores.sort_by(|a, b| a.compare(b, criterion));

        match scores.first() {
            Some(score) => {
                selected.insert(score.candidate.id);
            }
            None => break,
        }
    }
    selected
}

/// Selects routing MPRs.
///
/// `neighbors` maps every symmetric neighbor address to the originator of
/// its neighbor. The cost of reaching each neighbor is relaxed through the
/// 2-hop reports until it settles, so a detour through other neighbors
/// counts wherever it beats the direct link. A 2-hop address of a neighbor
/// needs no cover unless such a detour reaches it cheaper.
pub fn select_routing(
    candidates: &[Candidate],
    coverage: &[Coverage],
    neighbors: &BTreeMap<Ipv4Addr, Ipv4Addr>,
    criterion: Criterion,
) -> BTreeSet<Ipv4Addr> {
    let links: BTreeMap<Ipv4Addr, u32> = candidates
        .iter()
        .map(|candidate| (candidate.id, candidate.metric))
        .collect();
    let relays: BTreeSet<Ipv4Addr> = candidates
        .iter()
        .filter(|candidate| candidate.willingness != WILL_NEVER)
        .map(|candidate| candidate.id)
        .collect();
    let reach = relax(&links, &relays, coverage, neighbors);

    let paths: Vec<(Ipv4Addr, Ipv4Addr, u32)> = coverage
        .iter()
        .filter(|cover| relays.contains(&cover.via))
        .filter_map(|cover| {
            let metric = reach.get(&cover.via)?;
            Some((cover.via, cover.two_hop, metric.saturating_add(cover.metric)))
        })
        .collect();
    let best = shortest(&paths);

    let coverage: Vec<Coverage> = coverage
        .iter()
        .filter(|cover| {
            let direct = neighbors.get(&cover.two_hop).and_then(|owner| links.get(owner));
            match (direct, best.get(&cover.two_hop)) {
                (Some(direct), Some(best)) => direct > best,
                _ => true,
            }
        })
        .copied()
        .collect();
    let candidates: Vec<Candidate> = candidates
        .iter()
        .map(|candidate| Candidate {
            metric: reach.get(&candidate.id).copied().unwrap_or(candidate.metric),
            ..*candidate
        })
        .collect();
    select(&candidates, &coverage, criterion)
}

/// The cost of reaching every neighbor, lowered through detours over the
/// other neighbors until no cost changes.
fn relax(
    links: &BTreeMap<Ipv4Addr, u32>,
    relays: &BTreeSet<Ipv4Addr>,
    coverage: &[Coverage],
    neighbors: &BTreeMap<Ipv4Addr, Ipv4Addr>,
) -> BTreeMap<Ipv4Addr, u32> {
    let mut reach = links.clone();
    loop {
        let mut changed = false;
        for cover in coverage.iter().filter(|cover| relays.contains(&cover.via)) {
            let owner = match neighbors.get(&cover.two_hop) {
                Some(owner) if *owner != cover.via => owner,
                _ => continue,
            };
            let metric = match reach.get(&cover.via) {
                Some(via) => via.saturating_add(cover.metric),
                None => continue,
            };
            if let Some(known) = reach.get_mut(owner) {
                if metric < *known {
                    *known = metric;
                    changed = true;
                }
            }
        }
        if !changed {
            return reach;
        }
    }
}

/// The shortest 2-hop metric of every reported address.
fn shortest(paths: &[(Ipv4Addr, Ipv4Addr, u32)]) -> BTreeMap<Ipv4Addr, u32> {
    let mut best = BTreeMap::new();
    for (_, two_hop, metric) in paths.iter() {
        let known = best.entry(*two_hop).or_insert(*metric);
        if *metric < *known {
            *known = *metric;
        }
    }
    best
}

struct Score {
    candidate: Candidate,
    degree: u64,
    cost: u64,
}

impl Score {
    /// Orders the better score first.
    fn compare(&self, other: &Score, criterion: Criterion) -> Ordering {
        let primary = match criterion {
            Criterion::Degree => other.degree.cmp(&self.degree),
            Criterion::DegreeOrMetric => other
                .degree
                .cmp(&self.degree)
                .then(self.candidate.metric.cmp(&other.candidate.metric)),
            Criterion::MetricPerDegree => (self.cost * other.degree).cmp(&(other.cost * self.degree)),
        };
        primary
            .then(other.candidate.willingness.cmp(&self.candidate.willingness))
            .then(u32::from(self.candidate.id).cmp(&u32::from(other.candidate.id)))
    }
}
