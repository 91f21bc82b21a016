use std::collections::HashMap;

/// Shannon entropy in bits per character over the first `sample_chars`
/// characters of `text`.
pub fn shannon_entropy(text: &str, sample_chars: usize) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in text.chars().take(sample_chars) {
        *counts.entry(c).or_insert(0) += 1;
        total += 1;
    }

    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}
