//! Output artifacts: histogram (table + PNG) and regression tables (HTML).

pub mod histogram;
pub mod html;
pub mod plot;
