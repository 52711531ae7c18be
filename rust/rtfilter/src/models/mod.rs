pub mod psm;
pub mod raw_table;

pub use psm::{
    CanonicalColumn,
    Psm,
    PsmTable,
};
pub use raw_table::RawTable;
