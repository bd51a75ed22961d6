//! Target ordering per RFC 2782.

use crate::SrvRecord;
use rand::Rng;

/// Sorts SRV records by priority and weight per RFC 2782.
///
/// Records are ordered by ascending priority. Inside a priority group every
/// weight-0 record comes first, then the weighted records are drawn one at a
/// time without replacement, each with probability proportional to its weight
/// among those left.
pub fn order_srv_records<R: SrvRecord>(records: &mut [R], mut rng: impl Rng) {
    records.sort_by_key(|record| record.priority());

    let mut start = 0;
    while start < records.len() {
        let priority = records[start].priority();
        let len = records[start..]
            .iter()
            .take_while(|record| record.priority() == priority)
            .count();
        order_group(&mut records[start..start + len], &mut rng);
        start += len;
    }
}

/// Orders records sharing one priority.
fn order_group<R: SrvRecord>(group: &mut [R], rng: &mut impl Rng) {
    group.sort_by_key(|record| record.weight() != 0);
    let zeros = group.iter().take_while(|record| record.weight() == 0).count();
    let weighted = &mut group[zeros..];

    let mut sum: u32 = weighted.iter().map(|record| u32::from(record.weight())).sum();
    for next in 0..weighted.len() {
        let draw = rng.random_range(0..sum);
        let mut running = 0;
        let chosen = weighted[next..]
            .iter()
            .position(|record| {
                running += u32::from(record.weight());
                running > draw
            })
            .map_or(weighted.len() - 1, |idx| next + idx);
        sum -= u32::from(weighted[chosen].weight());
        weighted.swap(next, chosen);
    }
}
