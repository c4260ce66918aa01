//! A from-scratch isolation forest (Liu, Ting & Zhou, 2008). No ML crate
//! exists anywhere in the retrieved pack, so the algorithm — not a
//! third-party implementation of it — is grounded directly on
//! `reputation/anomaly.py`'s constants (100 estimators, `max_samples =
//! min(256, N)`, fixed seed 42) and on scikit-learn's public
//! `IsolationForest` semantics it wraps there.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

enum Node
{
  Leaf
  {
    size: usize,
  },
  Split
  {
    feature: usize,
    threshold: f64,
    left: Box<Node>,
    right: Box<Node>,
  },
}

/// Average path length of an unsuccessful BST search, used to normalise
/// path lengths for subsample sizes the tree didn't fully isolate down to.
fn c_factor(n: usize) -> f64
{
  if n <= 1
  {
    0.0
  }
  else
  {
    #[allow(clippy::cast_precision_loss)]
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - (2.0 * (n - 1.0) / n)
  }
}

struct IsolationTree
{
  root: Node,
  height_limit: usize,
}

impl IsolationTree
{
  fn build(data: &[Vec<f64>], height_limit: usize, rng: &mut StdRng) -> Self
  {
    let indices: Vec<usize> = (0..data.len()).collect();
    Self { root: Self::build_node(data, &indices, 0, height_limit, rng), height_limit }
  }

  fn build_node(
    data: &[Vec<f64>],
    indices: &[usize],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
  ) -> Node
  {
    if indices.len() <= 1 || depth >= height_limit
    {
      return Node::Leaf { size: indices.len() };
    }

    let n_features = data[0].len();
    // Try a handful of random features in case one is constant across the
    // subsample (in which case it can't be split on).
    for _ in 0..n_features.max(1)
    {
      let feature = rng.gen_range(0..n_features);
      let mut min_v = f64::INFINITY;
      let mut max_v = f64::NEG_INFINITY;
      for &i in indices
      {
        let v = data[i][feature];
        min_v = min_v.min(v);
        max_v = max_v.max(v);
      }
      if (max_v - min_v).abs() < f64::EPSILON
      {
        continue;
      }

      let threshold = rng.gen_range(min_v..max_v);
      let (left, right): (Vec<usize>, Vec<usize>) =
        indices.iter().partition(|&&i| data[i][feature] < threshold);

      if left.is_empty() || right.is_empty()
      {
        continue;
      }

      return Node::Split
      {
        feature,
        threshold,
        left: Box::new(Self::build_node(data, &left, depth + 1, height_limit, rng)),
        right: Box::new(Self::build_node(data, &right, depth + 1, height_limit, rng)),
      };
    }

    // Every feature was constant across this subsample — can't split further.
    Node::Leaf { size: indices.len() }
  }

  fn path_length(&self, point: &[f64]) -> f64
  {
    Self::walk(&self.root, point, 0, self.height_limit)
  }

  fn walk(node: &Node, point: &[f64], depth: usize, height_limit: usize) -> f64
  {
    match node
    {
      Node::Leaf { size } =>
      {
        #[allow(clippy::cast_precision_loss)]
        let depth = depth as f64;
        depth + c_factor(*size)
      }
      Node::Split { feature, threshold, left, right } =>
      {
        if depth >= height_limit
        {
          #[allow(clippy::cast_precision_loss)]
          let depth = depth as f64;
          return depth;
        }
        if point[*feature] < *threshold
        {
          Self::walk(left, point, depth + 1, height_limit)
        }
        else
        {
          Self::walk(right, point, depth + 1, height_limit)
        }
      }
    }
  }
}

/// A trained isolation forest: `n_estimators` trees, each grown on an
/// independent subsample of size `max_samples` drawn without replacement.
pub struct IsolationForest
{
  trees: Vec<IsolationTree>,
  max_samples: usize,
}

impl IsolationForest
{
  /// Fit a forest on `data` (row-major feature matrix, all rows same width).
  #[must_use]
  pub fn fit(data: &[Vec<f64>], n_estimators: usize, max_samples: usize, seed: u64) -> Self
  {
    let max_samples = max_samples.min(data.len()).max(1);
    let height_limit = (max_samples as f64).log2().ceil() as usize;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut trees = Vec::with_capacity(n_estimators);
    for _ in 0..n_estimators
    {
      let mut indices: Vec<usize> = (0..data.len()).collect();
      indices.shuffle(&mut rng);
      indices.truncate(max_samples);
      let subsample: Vec<Vec<f64>> = indices.iter().map(|&i| data[i].clone()).collect();
      trees.push(IsolationTree::build(&subsample, height_limit, &mut rng));
    }

    Self { trees, max_samples }
  }

  /// Anomaly score `s(x) ∈ [0, 1]` for `point`; values near 1 are more
  /// anomalous, values near 0.5 are typical, values near 0 are unusually
  /// "normal" (deep, long paths).
  #[must_use]
  pub fn score(&self, point: &[f64]) -> f64
  {
    #[allow(clippy::cast_precision_loss)]
    let mean_path: f64 =
      self.trees.iter().map(|t| t.path_length(point)).sum::<f64>() / self.trees.len() as f64;
    let c = c_factor(self.max_samples);
    if c <= 0.0
    {
      return 0.5;
    }
    2f64.powf(-mean_path / c)
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  fn clustered_data(seed: u64) -> Vec<Vec<f64>>
  {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..200)
      .map(|_| vec![rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)])
      .collect()
  }

  #[test]
  fn outlier_scores_higher_than_cluster_center()
  {
    let data = clustered_data(7);
    let forest = IsolationForest::fit(&data, 100, 256, 42);

    let typical = forest.score(&[0.5, 0.5]);
    let outlier = forest.score(&[50.0, 50.0]);

    assert!(outlier > typical, "outlier={outlier} typical={typical}");
  }

  #[test]
  fn score_is_bounded()
  {
    let data = clustered_data(3);
    let forest = IsolationForest::fit(&data, 50, 64, 1);
    let s = forest.score(&[0.5, 0.5]);
    assert!((0.0..=1.0).contains(&s));
  }
}
