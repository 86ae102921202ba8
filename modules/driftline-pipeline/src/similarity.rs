//! Similarity primitives: normalized edit distance for titles, 64-bit
//! SimHash fingerprints for content, cosine for embedding vectors.
//! Pure functions, no state.

/// Cap on fingerprint input length, for stability and performance.
const MAX_FINGERPRINT_INPUT: usize = 5_000;

/// Normalize a string for comparison: lowercase, trim, strip punctuation,
/// collapse whitespace.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Levenshtein edit distance, two-row DP over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            cur[j + 1] = substitution.min(cur[j] + 1).min(prev[j + 1] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Similarity score in [0, 1]: `1 - lev(a, b) / max(len)`. Comparison is
/// case-insensitive; identical strings score 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a.to_lowercase(), &b.to_lowercase());
    1.0 - distance as f64 / max_len as f64
}

/// 64-bit SimHash over the punctuation-stripped, lowercased token stream.
/// Per token: FNV-1a hash; per bit position a counter goes up if the bit is
/// set, down otherwise; the fingerprint sets bit i iff counter i ended
/// positive. An empty token stream yields 0.
pub fn simhash(text: &str) -> u64 {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .take(MAX_FINGERPRINT_INPUT)
        .collect();

    let mut counters = [0i32; 64];
    let mut saw_token = false;

    for token in normalized.split_whitespace() {
        saw_token = true;
        let hash = fnv1a_64(token);
        for (i, counter) in counters.iter_mut().enumerate() {
            if (hash >> i) & 1 == 1 {
                *counter += 1;
            } else {
                *counter -= 1;
            }
        }
    }

    if !saw_token {
        return 0;
    }

    let mut fingerprint = 0u64;
    for (i, counter) in counters.iter().enumerate() {
        if *counter > 0 {
            fingerprint |= 1 << i;
        }
    }
    fingerprint
}

/// Number of differing bits between two fingerprints.
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Dot product of two equal-length vectors. Inputs are expected to be
/// pre-normalized, so this is cosine similarity. Mismatched or empty
/// vectors score 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum()
}

/// FNV-1a over UTF-8 bytes, 64-bit.
fn fnv1a_64(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
