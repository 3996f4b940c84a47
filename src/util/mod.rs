mod slots;

pub use slots::*;
