pub mod assign;
pub mod mask;

pub use assign::{AoiAssigner, SubjectStats};
pub use mask::{AoiLabel, AoiMask, Region};
