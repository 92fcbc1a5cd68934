/// Errors raised by misuse of the ECS API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    #[error("system is not attached to a world")]
    NotAttached,
}
