//! Loop-family discovery and unit-capacity checking (spec §4.2).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::domain::{Basket, BasketId, SellOrder, SellType, UnitId};

/// Connected components of baskets linked by `looped_to`, treated as an
/// undirected graph, restricted to components of size >= 2 (spec §4.2).
///
/// Iteration order of the input is irrelevant: baskets are visited in
/// ascending id order so the returned families — and the order of members
/// within each — are deterministic (spec §9).
pub fn build_loop_families(baskets: &BTreeMap<BasketId, Basket>) -> Vec<BTreeSet<BasketId>> {
    let mut adjacency: BTreeMap<BasketId, BTreeSet<BasketId>> = BTreeMap::new();
    for basket in baskets.values() {
        if let Some(partner) = &basket.looped_to {
            adjacency.entry(basket.id.clone()).or_default().insert(partner.clone());
            adjacency.entry(partner.clone()).or_default().insert(basket.id.clone());
        }
    }

    let mut visited: BTreeSet<BasketId> = BTreeSet::new();
    let mut families = Vec::new();
    for start in baskets.keys() {
        if visited.contains(start) {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start.clone());
        let mut component: BTreeSet<BasketId> = BTreeSet::new();
        while let Some(current) = queue.pop_front() {
            if component.contains(&current) {
                continue;
            }
            component.insert(current.clone());
            visited.insert(current.clone());
            if let Some(neighbours) = adjacency.get(&current) {
                for n in neighbours {
                    if !component.contains(n) {
                        queue.push_back(n.clone());
                    }
                }
            }
        }
        if component.len() > 1 {
            families.push(component);
        }
    }
    families
}

/// Checks, per basket, that
/// `total(parent_qty) + sum(total(child_qty)) + max(total(substitutable_child_qty))`
/// does not exceed the owning unit's registered capacity, with tolerance
/// `eps_cap`. Returns one problem string per violation found; an empty
/// result means every check passed. Baskets with no sell orders produce no
/// output (spec §4.2).
pub fn validate_unit_capacity(
    sells: &[SellOrder],
    baskets: &BTreeMap<BasketId, Basket>,
    unit_capacity_registry: &BTreeMap<UnitId, f64>,
    eps_cap: f64,
) -> Vec<String> {
    let mut sells_by_basket: BTreeMap<BasketId, Vec<&SellOrder>> = BTreeMap::new();
    for s in sells {
        sells_by_basket.entry(s.basket.clone()).or_default().push(s);
    }

    let mut problems = Vec::new();
    for (basket_id, sells) in &sells_by_basket {
        let Some(basket) = baskets.get(basket_id) else {
            problems.push(format!("Undefined basket {basket_id}"));
            continue;
        };
        let Some(&cap) = unit_capacity_registry.get(&basket.unit) else {
            problems.push(format!(
                "Unit capacity not registered for unit {} (basket {basket_id})",
                basket.unit
            ));
            continue;
        };

        let mut parent_total = 0.0;
        let mut child_total = 0.0;
        let mut max_sub = 0.0f64;
        for s in sells {
            let total = s.total_qty();
            match s.sell_type {
                SellType::Parent => parent_total += total,
                SellType::Child => child_total += total,
                SellType::SubstitutableChild => max_sub = max_sub.max(total),
            }
        }

        let total_energy = parent_total + child_total + max_sub;
        if total_energy > cap + eps_cap {
            problems.push(format!(
                "Basket {basket_id} for unit {} violates capacity: {total_energy} > {cap}",
                basket.unit
            ));
        }
    }
    problems
}
