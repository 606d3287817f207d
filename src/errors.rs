mod build;
mod instantiate;
mod instantiator;
mod registration;
mod resolution;

pub use build::BuildErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;
pub use registration::RegistrationErrorKind;
pub use resolution::ResolutionFailed;
