use std::cmp::Ordering;

use crate::models::{DomainStat, Offer};

/// Aggregates one domain's offers and visit counter.
pub fn domain_stat(domain: &str, visits: u64, offers: &[Offer]) -> DomainStat {
    let offer_count = offers.len();
    let last_offer = offers.iter().map(|o| o.timestamp).max();
    let top_offer = offers.iter().map(|o| o.amount).fold(0.0, f64::max);

    // Amounts are non-negative, so `round` is half up
    let avg_offer = if offer_count == 0 {
        0
    } else {
        let sum: f64 = offers.iter().map(|o| o.amount).sum();
        (sum / offer_count as f64).round() as u64
    };

    DomainStat {
        domain: domain.to_string(),
        visits,
        last_offer,
        avg_offer,
        top_offer,
        offer_count,
    }
}

/// Offer count descending, then visits descending, then domain name.
pub fn compare_stats(a: &DomainStat, b: &DomainStat) -> Ordering {
    b.offer_count
        .cmp(&a.offer_count)
        .then_with(|| b.visits.cmp(&a.visits))
        .then_with(|| a.domain.cmp(&b.domain))
}

pub fn sort_domain_stats(stats: &mut [DomainStat]) {
    stats.sort_by(compare_stats);
}
