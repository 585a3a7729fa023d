mod builder;
mod core;
mod shared;
mod types;
#[cfg(test)]
mod tests;

pub use builder::QualityControllerBuilder;
pub use self::core::QualityController;
pub use shared::SharedQualityController;
pub use types::{Adaptation, AdaptationFlags, QualitySnapshot};
