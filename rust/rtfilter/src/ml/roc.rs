/// Receiver operating characteristic of a scored, labelled set.
///
/// A sample is predicted positive when its score is `>=` the threshold.
/// Points are ordered by decreasing threshold; the first one is `(0, 0)`
/// at `+inf`.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// ROC over every distinct score.
///
/// # Panics
/// If the lengths differ.
pub fn roc_curve(scores: &[f64], is_positive: &[bool]) -> RocCurve {
    assert_eq!(scores.len(), is_positive.len());
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut fps = vec![0.0];
    let mut tps = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];
    let mut tp = 0.0;
    let mut fp = 0.0;
    for (k, &i) in order.iter().enumerate() {
        if is_positive[i] {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_value = order
            .get(k + 1)
            .is_none_or(|&next| scores[next] != scores[i]);
        if last_of_value {
            tps.push(tp);
            fps.push(fp);
            thresholds.push(scores[i]);
        }
    }

    RocCurve {
        fpr: fps.iter().map(|x| x / fp).collect(),
        tpr: tps.iter().map(|x| x / tp).collect(),
        thresholds,
    }
}

impl RocCurve {
    /// Area under the curve, trapezoid rule.
    pub fn auc(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
            .sum()
    }

    /// Index of the operating point that maximizes `tpr - fpr` among the
    /// points reaching a minimum TPR. Ties resolve to the first index.
    pub fn cutoff_index(&self, min_tpr: f64) -> usize {
        let start = self.tpr.iter().position(|&t| t >= min_tpr).unwrap_or(0);
        let mut best = start;
        let mut best_j = f64::NEG_INFINITY;
        for i in start..self.tpr.len() {
            let j = self.tpr[i] - self.fpr[i];
            if j > best_j {
                best_j = j;
                best = i;
            }
        }
        best
    }
}
