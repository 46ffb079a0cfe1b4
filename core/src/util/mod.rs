mod fast_map;
mod sync;

pub use fast_map::*;
pub use sync::*;
