pub mod catalog;
pub mod record;

pub use catalog::{
    CatalogEntry, CatalogKind, SelectionSnapshot, SelectionState, auger_catalog, find_entry,
    radiative_catalog,
};
pub use record::{
    LevelKey, LevelLabel, LevelShape, RowKind, TransitionLine, parse_f64_or, parse_rate_rows,
    parse_u32_or,
};
