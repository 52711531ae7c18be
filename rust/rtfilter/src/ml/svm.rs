//! Linear support vector classifier with Platt-scaled probabilities.
//!
//! The classifier is trained with dual coordinate descent on the hinge
//! loss (Hsieh et al. 2008, as in liblinear), the bias is learned as the
//! weight of an extra constant feature. Probabilities follow the Newton
//! method with backtracking from Lin, Lin and Weng (2007).

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::TargetDecoy;

#[derive(Debug, Clone)]
pub struct SvmConfig {
    /// Penalty of the hinge loss.
    pub c: f64,
    /// Stop once the spread of the projected gradient is below this value.
    pub tolerance: f64,
    pub max_iter: usize,
    pub seed: u64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            tolerance: 0.1,
            max_iter: 1000,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearSvm<const N: usize> {
    pub weights: [f64; N],
    pub bias: f64,
    /// Label whose decision values are positive.
    pub positive: TargetDecoy,
    pub iterations: usize,
}

fn dot<const N: usize>(w: &[f64; N], x: &[f64; N]) -> f64 {
    w.iter().zip(x.iter()).map(|(a, b)| a * b).sum()
}

impl<const N: usize> LinearSvm<N> {
    /// # Panics
    /// If `features` and `labels` are not the same length.
    pub fn fit(
        features: &[[f64; N]],
        labels: &[TargetDecoy],
        positive: TargetDecoy,
        config: &SvmConfig,
    ) -> Self {
        assert_eq!(features.len(), labels.len());
        let n = features.len();
        let y: Vec<f64> = labels.iter().map(|l| l.sign(positive)).collect();
        // Squared norm of the augmented feature vector, the bias feature adds 1.
        let qd: Vec<f64> = features.iter().map(|x| dot(x, x) + 1.0).collect();

        let mut alpha = vec![0.0; n];
        let mut w = [0.0; N];
        let mut b = 0.0;
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let mut iter = 0;
        while iter < config.max_iter {
            order.shuffle(&mut rng);
            let mut pg_max = f64::NEG_INFINITY;
            let mut pg_min = f64::INFINITY;

            for &i in order.iter() {
                let x = &features[i];
                let g = y[i] * (dot(&w, x) + b) - 1.0;
                let pg = if alpha[i] == 0.0 {
                    g.min(0.0)
                } else if alpha[i] == config.c {
                    g.max(0.0)
                } else {
                    g
                };
                pg_max = pg_max.max(pg);
                pg_min = pg_min.min(pg);

                if pg.abs() > 1e-12 {
                    let old = alpha[i];
                    alpha[i] = (old - g / qd[i]).clamp(0.0, config.c);
                    let delta = (alpha[i] - old) * y[i];
                    for (wj, xj) in w.iter_mut().zip(x.iter()) {
                        *wj += delta * xj;
                    }
                    b += delta;
                }
            }
            iter += 1;

            if pg_max - pg_min < config.tolerance {
                break;
            }
        }
        debug!("Linear SVM finished after {} iterations", iter);

        Self {
            weights: w,
            bias: b,
            positive,
            iterations: iter,
        }
    }

    /// Signed distance to the hyperplane, positive values lean towards `positive`.
    pub fn decision_function(&self, x: &[f64; N]) -> f64 {
        dot(&self.weights, x) + self.bias
    }

    pub fn predict(&self, x: &[f64; N]) -> TargetDecoy {
        if self.decision_function(x) > 0.0 {
            self.positive
        } else {
            self.positive.flipped()
        }
    }
}

/// Sigmoid fit mapping decision values to probabilities of the positive label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlattScaling {
    pub a: f64,
    pub b: f64,
}

fn platt_objective(decisions: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    decisions
        .iter()
        .zip(targets.iter())
        .map(|(d, t)| {
            let f_ab = d * a + b;
            if f_ab >= 0.0 {
                t * f_ab + (1.0 + (-f_ab).exp()).ln()
            } else {
                (t - 1.0) * f_ab + (1.0 + f_ab.exp()).ln()
            }
        })
        .sum()
}

impl PlattScaling {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    /// `is_positive[i]` tells whether decision value `i` belongs to the positive label.
    pub fn fit(decisions: &[f64], is_positive: &[bool]) -> Self {
        assert_eq!(decisions.len(), is_positive.len());
        let prior1 = is_positive.iter().filter(|&&x| x).count() as f64;
        let prior0 = is_positive.len() as f64 - prior1;

        let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
        let lo_target = 1.0 / (prior0 + 2.0);
        let targets: Vec<f64> = is_positive
            .iter()
            .map(|&p| if p { hi_target } else { lo_target })
            .collect();

        let mut a = 0.0;
        let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
        let mut fval = platt_objective(decisions, &targets, a, b);

        for _ in 0..Self::MAX_ITER {
            let mut h11 = Self::SIGMA;
            let mut h22 = Self::SIGMA;
            let mut h21 = 0.0;
            let mut g1 = 0.0;
            let mut g2 = 0.0;
            for (d, t) in decisions.iter().zip(targets.iter()) {
                let f_ab = d * a + b;
                let (p, q) = if f_ab >= 0.0 {
                    let e = (-f_ab).exp();
                    (e / (1.0 + e), 1.0 / (1.0 + e))
                } else {
                    let e = f_ab.exp();
                    (1.0 / (1.0 + e), e / (1.0 + e))
                };
                let d2 = p * q;
                h11 += d * d * d2;
                h22 += d2;
                h21 += d * d2;
                let d1 = t - p;
                g1 += d * d1;
                g2 += d1;
            }

            if g1.abs() < Self::EPS && g2.abs() < Self::EPS {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let d_a = -(h22 * g1 - h21 * g2) / det;
            let d_b = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * d_a + g2 * d_b;

            let mut step = 1.0;
            while step >= Self::MIN_STEP {
                let new_a = a + step * d_a;
                let new_b = b + step * d_b;
                let new_f = platt_objective(decisions, &targets, new_a, new_b);
                if new_f < fval + 1e-4 * step * gd {
                    a = new_a;
                    b = new_b;
                    fval = new_f;
                    break;
                }
                step /= 2.0;
            }
            if step < Self::MIN_STEP {
                debug!("Platt scaling line search failed");
                break;
            }
        }
        Self { a, b }
    }

    pub fn probability(&self, decision: f64) -> f64 {
        let f_ab = decision * self.a + self.b;
        if f_ab >= 0.0 {
            (-f_ab).exp() / (1.0 + (-f_ab).exp())
        } else {
            1.0 / (1.0 + f_ab.exp())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<[f64; 2]>, Vec<TargetDecoy>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let off = i as f64 * 0.1;
            x.push([2.0 + off, 1.0 - off]);
            y.push(TargetDecoy::Decoy);
            x.push([-2.0 - off, -1.0 + off]);
            y.push(TargetDecoy::Target);
        }
        (x, y)
    }

    #[test]
    fn test_separable_data() {
        let (x, y) = separable();
        let svm = LinearSvm::fit(&x, &y, TargetDecoy::Decoy, &SvmConfig::default());
        for (xi, yi) in x.iter().zip(y.iter()) {
            assert_eq!(svm.predict(xi), *yi);
        }
        assert!(svm.decision_function(&[5.0, 0.0]) > 0.0);
        assert!(svm.decision_function(&[-5.0, 0.0]) < 0.0);
    }

    #[test]
    fn test_training_is_deterministic() {
        let (x, y) = separable();
        let a = LinearSvm::fit(&x, &y, TargetDecoy::Decoy, &SvmConfig::default());
        let b = LinearSvm::fit(&x, &y, TargetDecoy::Decoy, &SvmConfig::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_platt_is_monotonic() {
        let (x, y) = separable();
        let svm = LinearSvm::fit(&x, &y, TargetDecoy::Decoy, &SvmConfig::default());
        let dec: Vec<f64> = x.iter().map(|xi| svm.decision_function(xi)).collect();
        let pos: Vec<bool> = y.iter().map(|l| *l == TargetDecoy::Decoy).collect();
        let platt = PlattScaling::fit(&dec, &pos);
        let lo = platt.probability(-3.0);
        let mid = platt.probability(0.0);
        let hi = platt.probability(3.0);
        assert!(lo < mid && mid < hi, "{} {} {}", lo, mid, hi);
        assert!(hi > 0.5);
        assert!(lo < 0.5);
    }
}
