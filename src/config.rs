/// Config for a container
/// ## Fields
/// - `detect_cycles`:
///   If `true`, every resolution tracks the keys currently being built and fails with
///   [`crate::BuildErrorKind::CyclicDependency`] as soon as a key re-enters its own build.
///
///   Disabling it only leaves the depth limit as protection against runaway graphs.
/// - `max_resolution_depth`:
///   Maximum nesting of dependency builds within one resolution.
///   Exceeding it fails with [`crate::BuildErrorKind::MaxDepthExceeded`].
///
/// Child containers inherit the config of their parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerConfig {
    pub detect_cycles: bool,
    pub max_resolution_depth: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            detect_cycles: true,
            max_resolution_depth: 128,
        }
    }
}
