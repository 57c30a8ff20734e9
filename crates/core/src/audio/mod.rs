//! Audio primitives shared by the session engine and the library tools.

pub mod analysis;
pub mod effects;
pub mod io;
