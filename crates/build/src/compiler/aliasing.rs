//! Physical allocation assignment
//!
//! Maps logical resources onto physical allocations, reusing an allocation
//! when its previous occupant's lifetime has ended and the descriptors match.

use super::schedule::Allocation;
use crate::resource::ResourceDesc;

/// Lifetime of a logical resource within the schedule
#[derive(Debug, Clone)]
pub struct ResourceLifetime {
    /// Logical resource id; ids are dense, starting at zero
    pub id: usize,
    pub desc: ResourceDesc,
    /// Schedule index where the resource is produced
    pub first_use: usize,
    /// Schedule index where the resource is last read
    pub last_use: usize,
    /// Persistent resources keep a dedicated allocation
    pub persistent: bool,
}

/// Assigns physical allocations to logical resource lifetimes
///
/// Resources are visited ordered by (descriptor, first use, id). Each one takes
/// the lowest-indexed allocation with an equal descriptor whose current
/// lifetime ended strictly before it starts; otherwise a new allocation is
/// created. Persistent resources neither reuse nor donate an allocation.
///
/// # Returns
/// A tuple containing:
/// * `Vec<Allocation>` - Unique physical allocations, indexed by id
/// * `Vec<usize>` - Allocation id of each logical resource, indexed by resource id
pub fn assign_allocations(lifetimes: &[ResourceLifetime]) -> (Vec<Allocation>, Vec<usize>) {
    let mut order: Vec<&ResourceLifetime> = lifetimes.iter().collect();
    order.sort_by(|a, b| (a.desc, a.first_use, a.id).cmp(&(b.desc, b.first_use, b.id)));

    let mut allocations: Vec<Allocation> = Vec::new();
    let mut assignments = vec![0; lifetimes.len()];

    for lifetime in order {
        let reusable = if lifetime.persistent {
            None
        } else {
            allocations
                .iter_mut()
                .find(|allocation| !allocation.persistent && allocation.desc == lifetime.desc && allocation.last_use < lifetime.first_use)
        };

        let allocation_id = match reusable {
            Some(allocation) => {
                allocation.first_use = allocation.first_use.min(lifetime.first_use);
                allocation.last_use = allocation.last_use.max(lifetime.last_use);
                allocation.resources.push(lifetime.id);
                allocation.id
            }
            None => {
                let id = allocations.len();
                allocations.push(Allocation {
                    id,
                    desc: lifetime.desc,
                    first_use: lifetime.first_use,
                    last_use: lifetime.last_use,
                    resources: vec![lifetime.id],
                    persistent: lifetime.persistent,
                });
                id
            }
        };

        assignments[lifetime.id] = allocation_id;
    }

    (allocations, assignments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Extent, Format, ResourceKind};

    fn rgba(width: u32) -> ResourceDesc {
        ResourceDesc::image(ResourceKind::Texture, Format::Rgba32Float, Extent::new(width, width))
    }

    fn lifetime(id: usize, desc: ResourceDesc, first_use: usize, last_use: usize) -> ResourceLifetime {
        ResourceLifetime {
            id,
            desc,
            first_use,
            last_use,
            persistent: false,
        }
    }

    /// Every logical resource is served by exactly one allocation, and no two
    /// resources sharing an allocation overlap in time
    fn assert_valid_assignment(lifetimes: &[ResourceLifetime], allocations: &[Allocation], assignments: &[usize]) {
        for (id, &allocation) in assignments.iter().enumerate() {
            assert!(allocations[allocation].resources.contains(&id), "resource {id} missing from allocation {allocation}");
            assert_eq!(allocations[allocation].desc, lifetimes[id].desc);
        }
        for allocation in allocations {
            for (i, &a) in allocation.resources.iter().enumerate() {
                for &b in &allocation.resources[i + 1..] {
                    let (a, b) = (&lifetimes[a], &lifetimes[b]);
                    let disjoint = a.last_use < b.first_use || b.last_use < a.first_use;
                    assert!(disjoint, "resources {} and {} overlap in allocation {}", a.id, b.id, allocation.id);
                }
            }
        }
    }

    #[test]
    fn test_empty_lifetimes() {
        let (allocations, assignments) = assign_allocations(&[]);
        assert!(allocations.is_empty());
        assert!(assignments.is_empty());
    }

    #[test]
    fn test_disjoint_lifetimes_share_allocation() {
        let lifetimes = [lifetime(0, rgba(4), 0, 1), lifetime(1, rgba(4), 2, 3)];
        let (allocations, assignments) = assign_allocations(&lifetimes);
        assert_valid_assignment(&lifetimes, &allocations, &assignments);

        assert_eq!(allocations.len(), 1);
        assert_eq!(assignments, vec![0, 0]);
        assert_eq!((allocations[0].first_use, allocations[0].last_use), (0, 3));
        assert_eq!(allocations[0].resources, vec![0, 1]);
    }

    #[test]
    fn test_overlapping_lifetimes_do_not_share() {
        let lifetimes = [lifetime(0, rgba(4), 0, 2), lifetime(1, rgba(4), 2, 3)];
        let (allocations, assignments) = assign_allocations(&lifetimes);
        assert_valid_assignment(&lifetimes, &allocations, &assignments);
        assert_eq!(allocations.len(), 2);
        assert_ne!(assignments[0], assignments[1]);
    }

    #[test]
    fn test_different_descriptors_do_not_share() {
        let lifetimes = [lifetime(0, rgba(4), 0, 0), lifetime(1, rgba(8), 1, 1)];
        let (allocations, assignments) = assign_allocations(&lifetimes);
        assert_valid_assignment(&lifetimes, &allocations, &assignments);
        assert_eq!(allocations.len(), 2);
    }

    #[test]
    fn test_lowest_indexed_allocation_is_reused() {
        // 0 and 1 overlap, so two allocations exist by the time 2 and 3 arrive
        let lifetimes = [
            lifetime(0, rgba(4), 0, 1),
            lifetime(1, rgba(4), 1, 2),
            lifetime(2, rgba(4), 3, 4),
            lifetime(3, rgba(4), 3, 5),
        ];
        let (allocations, assignments) = assign_allocations(&lifetimes);
        assert_valid_assignment(&lifetimes, &allocations, &assignments);
        assert_eq!(allocations.len(), 2);
        assert_eq!(assignments, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_persistent_resources_never_alias() {
        let mut history = lifetime(0, rgba(4), 0, 3);
        history.persistent = true;
        let lifetimes = [history, lifetime(1, rgba(4), 4, 5), lifetime(2, rgba(4), 6, 7)];
        let (allocations, assignments) = assign_allocations(&lifetimes);
        assert_valid_assignment(&lifetimes, &allocations, &assignments);

        assert_eq!(allocations.len(), 2);
        assert!(allocations[assignments[0]].persistent);
        assert_eq!(allocations[assignments[0]].resources, vec![0]);
        assert_eq!(assignments[1], assignments[2]);
    }

    #[test]
    fn test_mixed_chain_minimizes_allocations() {
        // A ping-pong chain of six same-sized passes needs only two allocations
        let lifetimes: Vec<_> = (0..6).map(|i| lifetime(i, rgba(16), i, i + 1)).collect();
        let (allocations, assignments) = assign_allocations(&lifetimes);
        assert_valid_assignment(&lifetimes, &allocations, &assignments);
        assert_eq!(allocations.len(), 2);
        assert_eq!(assignments, vec![0, 1, 0, 1, 0, 1]);
    }
}
