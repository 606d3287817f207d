#[derive(thiserror::Error, Debug)]
pub enum RegistrationErrorKind {
    #[error("Lifetime manager {manager} is already attached to another registration")]
    LifetimeManagerInUse { manager: &'static str },
    #[error("The type {to} cannot be assigned to type {from}")]
    TypeMismatch { from: &'static str, to: &'static str },
    #[error("Container is disposed")]
    Disposed,
}
