//! Deterministic train/test split by index parity.

/// Split the indices `0..n` into (train, test) by parity: odd indices
/// train, even indices test. Every index lands in exactly one side.
///
/// With the dataset sorted identity-first, alternating indices spread each
/// identity's images across both sides without randomization.
pub fn parity_split(n: usize) -> (Vec<usize>, Vec<usize>) {
    let train = (0..n).filter(|i| i % 2 != 0).collect();
    let test = (0..n).filter(|i| i % 2 == 0).collect();
    (train, test)
}
