//! Scoped ownership for native handles that have no destructor of their own (EGL displays,
//! contexts, surfaces). The destroy function runs exactly once for every value the wrapper
//! held, whichever way the owning scope is left.

pub struct Owned<'a, T> {
    value: Option<T>,
    destroy: Box<dyn FnMut(T) + 'a>,
}

impl<'a, T> Owned<'a, T> {
    /// Take ownership of `value`, which will be passed to `destroy` when released.
    pub fn new(value: T, destroy: impl FnMut(T) + 'a) -> Self {
        Self {
            value: Some(value),
            destroy: Box::new(destroy),
        }
    }

    pub fn get(&self) -> &T {
        self.value
            .as_ref()
            .expect("Owned value accessed after release")
    }

    /// Destroy the held value (if any) and hold `value` instead.
    pub fn replace(&mut self, value: T) {
        self.release();
        self.value = Some(value);
    }

    /// Destroy the held value now. Releasing twice is a no-op.
    pub fn release(&mut self) {
        if let Some(value) = self.value.take() {
            (self.destroy)(value);
        }
    }

    /// Hand the value over to the caller without destroying it.
    pub fn into_inner(mut self) -> T {
        self.value
            .take()
            .expect("Owned value accessed after release")
    }
}

impl<T> Drop for Owned<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}
