mod obj;
mod simplify;

pub use obj::*;
pub use simplify::*;
