pub mod cell;
pub mod design;
pub mod material;
pub mod pn;
