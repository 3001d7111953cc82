//! Integer millisecond distribution
//!
//! Splits a chunk's duration across its segments in proportion to word
//! counts. Works in whole milliseconds so the parts always sum exactly to
//! the whole and the timeline stays gap-free.

/// Split `total_ms` across segments weighted by word count
///
/// Weights are `max(word_count, 1)`. Every segment gets the floor of its
/// exact share; leftover milliseconds go one each to the largest fractional
/// remainders, earlier segments first on ties.
pub fn distribute_ms(total_ms: u64, word_counts: &[usize]) -> Vec<u64> {
    if word_counts.is_empty() {
        return Vec::new();
    }

    let weights: Vec<u128> = word_counts.iter().map(|&w| w.max(1) as u128).collect();
    let weight_sum: u128 = weights.iter().sum();
    let total = total_ms as u128;

    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (i, w) in weights.iter().enumerate() {
        let scaled = total * w;
        shares.push((scaled / weight_sum) as u64);
        remainders.push((scaled % weight_sum, i));
    }

    let assigned: u64 = shares.iter().sum();
    let leftover = (total_ms - assigned) as usize;

    // Largest remainder first, stable on index
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, i) in remainders.iter().take(leftover) {
        shares[i] += 1;
    }

    shares
}

/// Turn durations into start offsets beginning at `origin_ms`
pub fn starts_ms(origin_ms: u64, durations_ms: &[u64]) -> Vec<u64> {
    durations_ms
        .iter()
        .scan(origin_ms, |cursor, &d| {
            let start = *cursor;
            *cursor += d;
            Some(start)
        })
        .collect()
}

/// Seconds to the nearest millisecond, clamping negatives to zero
pub fn to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

/// Milliseconds to seconds
pub fn to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
