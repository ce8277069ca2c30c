//! Reverse-Zipf queue sizing for the temperature queues.
//!
//! Queue `i` of `k` (hottest first) gets a share proportional to
//! `1/(k - i + 1)` normalized by the harmonic number `H_k`, so the coldest
//! queue is the largest. The number of queues is the largest `k` whose
//! hottest queue still holds at least `min_hottest_size` tiles.

fn harmonic(k: usize) -> f64 {
    (1..=k).map(|i| 1.0 / i as f64).sum()
}

fn hottest_size(total: usize, k: usize) -> usize {
    ((total as f64) * (1.0 / k as f64) / harmonic(k)).floor() as usize
}

/// Queue sizes from hottest to coldest, summing to `total_tiles`. Fewer
/// tiles than `min_hottest_size` yield a single queue; zero tiles yield no
/// queues.
#[must_use]
pub fn zipf_queue_sizes(total_tiles: usize, min_hottest_size: usize) -> Vec<usize> {
    let min_hottest_size = min_hottest_size.max(1);
    if total_tiles == 0 {
        return Vec::new();
    }
    if total_tiles <= min_hottest_size {
        return vec![total_tiles];
    }

    // hottest_size(k) is monotonically non-increasing in k, so binary search
    // for the largest k that still satisfies the floor.
    let mut left = 1;
    let mut right = total_tiles / min_hottest_size;
    let mut num_queues = 1;
    while left <= right {
        let k = usize::midpoint(left, right);
        if hottest_size(total_tiles, k) >= min_hottest_size {
            num_queues = k;
            left = k + 1;
        } else {
            right = k - 1;
        }
    }

    let harmonic_sum = harmonic(num_queues);
    let mut sizes: Vec<usize> = (1..=num_queues)
        .map(|i| {
            let proportion = (1.0 / (num_queues - i + 1) as f64) / harmonic_sum;
            ((total_tiles as f64) * proportion).round() as usize
        })
        .collect();

    // Fix rounding drift from the coldest end until the sizes sum to total.
    let target = total_tiles as isize;
    let mut allocated: isize = sizes.iter().map(|&size| size as isize).sum();
    while allocated != target {
        let before = allocated;
        for size in sizes.iter_mut().rev() {
            if allocated < target {
                *size += 1;
                allocated += 1;
            } else if allocated > target && *size > 1 {
                *size -= 1;
                allocated -= 1;
            }
            if allocated == target {
                break;
            }
        }
        if allocated == before {
            break;
        }
    }

    sizes
}
