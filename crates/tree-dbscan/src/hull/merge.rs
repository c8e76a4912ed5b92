//! Merging hull sets and attaching forwarded noise to them.

use core::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use super::{HullMatcher, HullModel, NoisePoint};
use crate::{InstanceId, Result};

/// Lexicographic order on coordinate rows.
fn cmp_rows(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

/// Total order on hulls: canonical key first, then member contents, then
/// ceded instances.
pub fn canonical_cmp(a: &HullModel, b: &HullModel) -> Ordering {
    a.canonical_key()
        .cmp(&b.canonical_key())
        .then_with(|| {
            let (ma, mb) = (sorted_members(a), sorted_members(b));
            ma.iter()
                .zip(&mb)
                .map(|((ia, sa, ca), (ib, sb, cb))| ia.cmp(ib).then(sa.cmp(sb)).then_with(|| cmp_rows(ca, cb)))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| ma.len().cmp(&mb.len()))
        })
        .then_with(|| a.ceded().cmp(b.ceded()))
}

fn sorted_members(hull: &HullModel) -> Vec<(InstanceId, u64, &[f64])> {
    let mut members = hull.members().collect::<Vec<_>>();
    members.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    members
}

/// Merges hulls by set union with instance-level deduplication.
///
/// Hulls are never fused. When an instance appears more than once, the copy
/// with the larger neighbourhood size survives. Equal sizes go to the copy
/// with the smaller coordinates, then to the hull with the smaller
/// [lineage](HullModel::lineage), and only then to the hull that comes first
/// in canonical order. A hull that loses members loses as much density and
/// records them as ceded; a hull left with no members is dropped. Identical
/// hulls collapse into one.
///
/// No part of the tie-break changes when a hull loses members, so merging in
/// one step or in any grouping of steps gives the same hulls. The result is
/// in canonical order and does not depend on the order of the input.
pub fn merge_hulls<I: IntoIterator<Item = HullModel>>(hulls: I) -> Vec<HullModel> {
    let mut hulls = hulls.into_iter().collect::<Vec<_>>();
    hulls.sort_by(canonical_cmp);
    hulls.dedup();
    let lineages = hulls.par_iter().map(HullModel::lineage).collect::<Vec<_>>();

    // Whether member `m` of hull `h` beats member `wm` of hull `wh`.
    let beats = |(h, m): (usize, usize), (wh, wm): (usize, usize)| {
        let (a, b) = (&hulls[h], &hulls[wh]);
        a.neighbourhood_sizes()[m]
            .cmp(&b.neighbourhood_sizes()[wm])
            .then_with(|| cmp_rows(b.coordinates(wm), a.coordinates(m)))
            .then_with(|| lineages[wh].cmp(&lineages[h]))
            .then_with(|| wh.cmp(&h))
            .is_gt()
    };

    // instance -> (hull, member)
    let mut winners = HashMap::<InstanceId, (usize, usize)>::new();
    for (h, hull) in hulls.iter().enumerate() {
        for (m, &id) in hull.instances().iter().enumerate() {
            winners
                .entry(id)
                .and_modify(|w| {
                    if beats((h, m), *w) {
                        *w = (h, m);
                    }
                })
                .or_insert((h, m));
        }
    }

    let mut merged = hulls
        .iter()
        .enumerate()
        .map(|(h, hull)| {
            let instances = hull.instances();
            let won = |m: usize| winners.get(&instances[m]) == Some(&(h, m));
            if (0..instances.len()).all(won) {
                hull.clone()
            } else {
                ftlog::debug!("Dropping duplicate instances from a hull of density {}.", hull.density());
                hull.retain_members(won)
            }
        })
        .filter(|hull| !hull.is_empty())
        .collect::<Vec<_>>();
    merged.sort_by(canonical_cmp);
    merged
}

/// Attaches forwarded noise points to merged hulls.
///
/// Noise whose instance already belongs to a hull is discarded, and noise
/// reported twice keeps the copy with the larger neighbourhood size. Every
/// other noise point within `epsilon` of a core member of some hull joins
/// the best matching hull as a non-core member. Absorbed points never serve
/// as anchors for other noise, so the outcome does not depend on the order
/// of the noise.
///
/// Returns the hulls in canonical order and the remaining noise sorted by
/// instance.
///
/// # Errors
///
/// * If a noise point does not have the dimensionality of the hull it joins.
pub fn absorb_noise(
    hulls: Vec<HullModel>,
    noise: Vec<NoisePoint>,
    epsilon: f64,
    min_points: usize,
) -> Result<(Vec<HullModel>, Vec<NoisePoint>)> {
    let clustered = hulls
        .iter()
        .flat_map(|h| h.instances().iter().copied())
        .collect::<HashSet<_>>();

    let mut noise = noise
        .into_iter()
        .filter(|p| !clustered.contains(&p.instance))
        .collect::<Vec<_>>();
    noise.sort_by(|a, b| {
        a.instance
            .cmp(&b.instance)
            .then(b.neighbourhood_size.cmp(&a.neighbourhood_size))
            .then_with(|| cmp_rows(&a.coordinates, &b.coordinates))
    });
    noise.dedup_by_key(|p| p.instance);

    if hulls.is_empty() || noise.is_empty() {
        return Ok((hulls, noise));
    }

    let matcher = HullMatcher::new(&hulls, epsilon, min_points);
    let matches = noise
        .par_iter()
        .map(|p| matcher.best_match(&p.coordinates).map(|(h, _)| h))
        .collect::<Vec<_>>();

    let mut joining = vec![Vec::new(); hulls.len()];
    let mut remaining = Vec::new();
    for (p, m) in noise.into_iter().zip(matches) {
        match m {
            Some(h) => joining[h].push(p),
            None => remaining.push(p),
        }
    }

    let absorbed = joining.iter().map(Vec::len).sum::<usize>();
    if absorbed > 0 {
        ftlog::debug!("Absorbed {absorbed} noise points into hulls; {} remain.", remaining.len());
    }

    let mut hulls = hulls
        .iter()
        .zip(&joining)
        .map(|(hull, points)| {
            if points.is_empty() {
                Ok(hull.clone())
            } else {
                hull.with_members(points)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    hulls.sort_by(canonical_cmp);

    Ok((hulls, remaining))
}
