pub mod cascade;
pub mod cross_section;
pub mod fit;
pub mod formation;
pub mod intensity;
pub mod overlap;
pub mod profile;
pub mod selection;
pub mod serialization;
pub mod shake;
pub mod simulation;
pub mod tables;
