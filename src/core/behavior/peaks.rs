//! Debounced peak search.
//!
//! Local maxima (flat tops resolve to their middle sample) at or above `height`, then
//! thinned so that no two survivors are closer than `distance` frames. Thinning keeps the
//! highest peak first; among equal heights the later peak wins.

/// Returns sample positions of the accepted peaks in increasing order.
///
/// `frames[i]` is the frame index of `values[i]`; spacing is measured on frame indices so
/// dropped frames still count toward the debounce window.
pub fn find_peaks(values: &[f64], frames: &[u64], height: f64, distance: u64) -> Vec<usize> {
    debug_assert_eq!(values.len(), frames.len());

    let peaks: Vec<usize> = local_maxima(values)
        .into_iter()
        .filter(|&p| values[p] >= height)
        .collect();

    if distance <= 1 || peaks.len() < 2 {
        return peaks;
    }
    select_by_distance(&peaks, values, frames, distance)
}

fn local_maxima(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut maxima = Vec::new();
    if n < 3 {
        return maxima;
    }

    let mut i = 1;
    while i < n - 1 {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                maxima.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    maxima
}

fn select_by_distance(peaks: &[usize], values: &[f64], frames: &[u64], distance: u64) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];

    // stable ascending sort by height, walked from the back
    let mut priority: Vec<usize> = (0..peaks.len()).collect();
    priority.sort_by(|&a, &b| values[peaks[a]].total_cmp(&values[peaks[b]]));

    for &i in priority.iter().rev() {
        if !keep[i] {
            continue;
        }
        let here = frames[peaks[i]];

        let mut k = i;
        while k > 0 && here - frames[peaks[k - 1]] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = i + 1;
        while k < peaks.len() && frames[peaks[k]] - here < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}
