//! Score fusion over several ranked signals.
//!
//! Each signal is a list of `(key, score)` pairs ordered best first. Keys are
//! whatever identifies a candidate to the caller; the in-memory store uses the
//! insertion position, so ordering keys ascending breaks ties by insertion order.

use std::collections::HashMap;
use std::hash::Hash;

use triage_core::types::Fusion;

pub const DEFAULT_RRF_K: f32 = 60.0;

pub fn fuse<K>(fusion: Fusion, signals: &[Vec<(K, f32)>], rrf_k: f32) -> Vec<(K, f32)>
where
    K: Copy + Ord + Hash,
{
    match fusion {
        Fusion::RankSum => rank_sum(signals),
        Fusion::ReciprocalRank => reciprocal_rank(signals, rrf_k),
    }
}

/// Distribution-based score fusion. Scores of each signal are mapped through
/// `(s - (mean - 3sd)) / 6sd`, clamped to `[0, 1]`, and summed per key.
/// A signal with zero spread maps every score to 0.5.
pub fn rank_sum<K>(signals: &[Vec<(K, f32)>]) -> Vec<(K, f32)>
where
    K: Copy + Ord + Hash,
{
    let mut fused: HashMap<K, f32> = HashMap::new();
    for signal in signals {
        if signal.is_empty() {
            continue;
        }
        let n = signal.len() as f32;
        let mean = signal.iter().map(|(_, s)| s).sum::<f32>() / n;
        let var = signal.iter().map(|(_, s)| (s - mean).powi(2)).sum::<f32>() / n;
        let sd = var.sqrt();
        for (key, score) in signal {
            let norm = if sd > f32::EPSILON {
                ((score - (mean - 3.0 * sd)) / (6.0 * sd)).clamp(0.0, 1.0)
            } else {
                0.5
            };
            *fused.entry(*key).or_insert(0.0) += norm;
        }
    }
    sorted(fused)
}

/// Reciprocal-rank fusion: `sum(1 / (rrf_k + rank))` with 1-based ranks.
pub fn reciprocal_rank<K>(signals: &[Vec<(K, f32)>], rrf_k: f32) -> Vec<(K, f32)>
where
    K: Copy + Ord + Hash,
{
    let mut fused: HashMap<K, f32> = HashMap::new();
    for signal in signals {
        for (pos, (key, _)) in signal.iter().enumerate() {
            *fused.entry(*key).or_insert(0.0) += 1.0 / (rrf_k + (pos + 1) as f32);
        }
    }
    sorted(fused)
}

/// Orders a signal best first, ties by ascending key.
pub fn rank_signal<K: Copy + Ord>(mut signal: Vec<(K, f32)>) -> Vec<(K, f32)> {
    signal.sort_by(|a, b| a.0.cmp(&b.0));
    signal.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    signal
}

fn sorted<K: Copy + Ord>(fused: HashMap<K, f32>) -> Vec<(K, f32)> {
    rank_signal(fused.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbsf_sums_normalised_scores() {
        let dense = vec![(0usize, 0.9), (1, 0.5), (2, 0.1)];
        let sparse = vec![(1usize, 2.0), (0, 1.0)];
        let fused = rank_sum(&[dense, sparse]);
        // doc 1 wins on the sparse signal; doc 2 gets nothing from it.
        assert_eq!(fused.iter().map(|(k, _)| *k).collect::<Vec<_>>(), vec![1, 0, 2]);
        assert!(fused.iter().all(|(_, s)| (0.0..=2.0).contains(s)));
    }

    #[test]
    fn dbsf_flat_signal_is_half() {
        let fused = rank_sum(&[vec![(7u32, 3.0), (3u32, 3.0)]]);
        assert_eq!(fused, vec![(3, 0.5), (7, 0.5)]);
    }

    #[test]
    fn rrf_uses_one_based_rank() {
        let fused = reciprocal_rank(&[vec![(0usize, 0.9)], vec![(0usize, 5.0)]], 60.0);
        assert!((fused[0].1 - 2.0 / 61.0).abs() < 1e-7);
    }

    #[test]
    fn rrf_ignores_raw_scores() {
        let a = reciprocal_rank(&[vec![(0usize, 100.0), (1, 1.0)]], 60.0);
        let b = reciprocal_rank(&[vec![(0usize, 0.2), (1, 0.1)]], 60.0);
        assert_eq!(a, b);
    }

    #[test]
    fn ties_resolve_by_key() {
        let fused = reciprocal_rank(&[vec![(2usize, 1.0)], vec![(1usize, 1.0)]], 60.0);
        assert_eq!(fused[0].0, 1);
        assert_eq!(fused[1].0, 2);
    }

    #[test]
    fn empty_signals_fuse_to_nothing() {
        let fused: Vec<(usize, f32)> = fuse(Fusion::RankSum, &[vec![], vec![]], DEFAULT_RRF_K);
        assert!(fused.is_empty());
    }
}
