/// Percentile rank of each value within the trailing `window` values ending at it.
///
/// The first `window - 1` entries are `None`. Every later entry is
/// `count(window values <= values[i]) / window`, so ties count toward the
/// numerator and a window minimum scores `1 / window`. A `window` of zero
/// yields all `None`.
///
/// The window is kept as a sorted buffer: each step does a binary-search
/// insert and remove (O(log W) comparisons, O(W) element shifts) and one
/// binary search for the rank. For trading-year windows the shifts are a
/// short memmove, far cheaper than rescanning the window.
pub fn rolling_percentile(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut sorted: Vec<f64> = Vec::with_capacity(window + 1);
    let size = window as f64;

    for (i, &value) in values.iter().enumerate() {
        let pos = sorted.partition_point(|x| x.total_cmp(&value).is_lt());
        sorted.insert(pos, value);

        if i >= window {
            let expired = values[i - window];
            let idx = sorted.partition_point(|x| x.total_cmp(&expired).is_lt());
            sorted.remove(idx);
        }

        if i + 1 >= window {
            let at_or_below = sorted.partition_point(|x| x.total_cmp(&value).is_le());
            out.push(Some(at_or_below as f64 / size));
        } else {
            out.push(None);
        }
    }

    out
}
