pub mod pn;
pub mod semiconductor;
