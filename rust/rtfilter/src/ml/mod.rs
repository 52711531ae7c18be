pub mod roc;
pub mod scaler;
pub mod svm;

pub use roc::{
    RocCurve,
    roc_curve,
};
pub use scaler::StandardScaler;
pub use svm::{
    LinearSvm,
    PlattScaling,
    SvmConfig,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetDecoy {
    Target,
    Decoy,
}

impl TargetDecoy {
    pub fn from_is_decoy(is_decoy: bool) -> Self {
        if is_decoy {
            TargetDecoy::Decoy
        } else {
            TargetDecoy::Target
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            TargetDecoy::Target => TargetDecoy::Decoy,
            TargetDecoy::Decoy => TargetDecoy::Target,
        }
    }

    /// +1 / -1 encoding of the label, `positive` maps to +1.
    pub fn sign(self, positive: TargetDecoy) -> f64 {
        if self == positive { 1.0 } else { -1.0 }
    }
}
