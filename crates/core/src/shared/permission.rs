use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "capture authorized" signal.
///
/// The OS-level permission dialog lives outside this crate; whoever owns it
/// flips the gate. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct PermissionGate {
    granted: Arc<AtomicBool>,
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gate that starts out granted, for callers with no permission model.
    pub fn granted() -> Self {
        let gate = Self::new();
        gate.grant();
        gate
    }

    pub fn grant(&self) {
        self.granted.store(true, Ordering::SeqCst);
    }

    pub fn revoke(&self) {
        self.granted.store(false, Ordering::SeqCst);
    }

    pub fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}
