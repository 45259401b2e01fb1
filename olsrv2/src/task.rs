//! The periodic work of the engine.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Hello,
    Tc,
    /// Expires tuples and recomputes MPRs and routes.
    Sweep,
}

impl routing_core::Task for Task {
    type Key = Task;

    fn key(&self) -> Self::Key {
        *self
    }
}
