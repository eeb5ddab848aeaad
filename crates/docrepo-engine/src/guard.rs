//! Scope guard used to reset busy flags.

/// Runs the closure when dropped, including when the owning future is
/// dropped before completion.
pub(crate) struct OnDrop<F: FnMut()> {
    f: F,
}

impl<F: FnMut()> OnDrop<F> {
    pub(crate) fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F: FnMut()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        (self.f)()
    }
}
