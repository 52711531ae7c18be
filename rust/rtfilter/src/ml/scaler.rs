/// Per-feature standardization to zero mean and unit variance.
///
/// Uses the population standard deviation; features with zero variance
/// are only centered.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler<const N: usize> {
    pub mean: [f64; N],
    pub scale: [f64; N],
}

impl<const N: usize> StandardScaler<N> {
    /// # Panics
    /// If `data` is empty.
    pub fn fit(data: &[[f64; N]]) -> Self {
        assert!(!data.is_empty(), "Cannot fit a scaler on empty data");
        let n = data.len() as f64;
        let mut mean = [0.0; N];
        for row in data.iter() {
            for (m, x) in mean.iter_mut().zip(row.iter()) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut scale = [0.0; N];
        for row in data.iter() {
            for ((s, x), m) in scale.iter_mut().zip(row.iter()).zip(mean.iter()) {
                *s += (x - m).powi(2);
            }
        }
        for s in scale.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std == 0.0 { 1.0 } else { std };
        }
        Self { mean, scale }
    }

    pub fn transform(&self, row: &[f64; N]) -> [f64; N] {
        let mut out = [0.0; N];
        for i in 0..N {
            out[i] = (row[i] - self.mean[i]) / self.scale[i];
        }
        out
    }

    pub fn fit_transform(data: &[[f64; N]]) -> (Self, Vec<[f64; N]>) {
        let scaler = Self::fit(data);
        let out = data.iter().map(|x| scaler.transform(x)).collect();
        (scaler, out)
    }
}
