//! 应用层

pub mod pricelist;
