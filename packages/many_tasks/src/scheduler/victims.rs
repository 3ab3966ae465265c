use itertools::Itertools;

use crate::ProcessingUnit;
use crate::scheduler::policy::VictimOrder;
use crate::topology::distance;

/// The other workers a worker may steal from, grouped into tiers of equal preference.
///
/// Tiers are probed in order. Within a tier the starting point rotates on every steal attempt
/// so that no victim is perpetually preferred over its peers.
pub(crate) type VictimTiers = Box<[Box<[usize]>]>;

/// Calculates the victim tiers of every worker in a pool.
///
/// `units` are the pool's processing units in worker order.
pub(crate) fn victim_tiers(order: VictimOrder, units: &[ProcessingUnit]) -> Box<[VictimTiers]> {
    (0..units.len())
        .map(|thief| match order {
            VictimOrder::None => VictimTiers::default(),
            VictimOrder::RoundRobin => round_robin(thief, units.len()),
            VictimOrder::Nearest => nearest_first(thief, units),
        })
        .collect()
}

/// One tier with everyone else, starting from the next worker.
#[expect(
    clippy::arithmetic_side_effects,
    reason = "offset and thief are both below worker_count"
)]
fn round_robin(thief: usize, worker_count: usize) -> VictimTiers {
    let others = (1..worker_count)
        .map(|offset| (thief + offset) % worker_count)
        .collect::<Box<[_]>>();

    if others.is_empty() {
        VictimTiers::default()
    } else {
        Box::new([others])
    }
}

/// Same NUMA domain before other domains, each ordered by closeness.
///
/// The domain is the tier boundary, so the rotating start point spreads steals across all
/// workers of the nearest domain instead of always draining the adjacent one.
fn nearest_first(thief: usize, units: &[ProcessingUnit]) -> VictimTiers {
    let Some(origin) = units.get(thief) else {
        return VictimTiers::default();
    };

    units
        .iter()
        .enumerate()
        .filter(|(worker, _)| *worker != thief)
        .map(|(worker, unit)| (distance(origin, unit), worker))
        .sorted()
        .chunk_by(|((remote, _), _)| *remote)
        .into_iter()
        .map(|(_, tier)| tier.map(|(_, worker)| worker).collect())
        .collect()
}
