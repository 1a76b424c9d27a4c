use std::sync::atomic::AtomicU64;
pub use std::sync::atomic::Ordering;

/// An atomic f64, stored through its IEEE-754 bit pattern.
///
/// The standard library provides no atomic float, so the value is kept in
/// an `AtomicU64` and converted on access.
#[derive(Debug)]
pub struct AtomicF64 {
    storage: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            storage: AtomicU64::new(value.to_bits()),
        }
    }
    pub fn store(&self, value: f64, ordering: Ordering) {
        self.storage.store(value.to_bits(), ordering);
    }
    pub fn load(&self, ordering: Ordering) -> f64 {
        f64::from_bits(self.storage.load(ordering))
    }
}
