//! Fixed-capacity reservoir sampling (Algorithm R).

use rand::Rng;

/// Uniform random sample of bounded size from a stream of unknown length.
///
/// After `n >= k` insertions every inserted item is retained with
/// probability `k / n`. Memory is `O(k)` regardless of stream length.
#[derive(Debug, Clone)]
pub struct ReservoirSampler<T> {
    capacity: usize,
    seen: u64,
    items: Vec<T>,
}

impl<T> ReservoirSampler<T> {
    /// Creates an empty reservoir holding at most `capacity` items.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: 0,
            items: Vec::with_capacity(capacity.min(1 << 16)),
        }
    }

    /// Offers one item to the reservoir.
    ///
    /// The `n`-th item replaces a uniformly chosen slot with probability
    /// `k / n` once the reservoir is full.
    pub fn add<R: Rng + ?Sized>(&mut self, item: T, rng: &mut R) {
        self.seen += 1;
        if self.capacity == 0 {
            return;
        }
        if self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }
        let idx = rng.gen_range(0..self.seen);
        if let Ok(idx) = usize::try_from(idx) {
            if idx < self.capacity {
                self.items[idx] = item;
            }
        }
    }

    /// Maximum number of retained items.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items offered so far.
    #[must_use]
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Number of retained items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Currently retained items, in slot order.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consumes the reservoir, returning the retained items.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn test_fills_up_to_capacity() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        let mut reservoir = ReservoirSampler::new(2);
        reservoir.add("a", &mut rng);
        reservoir.add("b", &mut rng);
        assert_eq!(reservoir.items(), &["a", "b"]);
        assert_eq!(reservoir.seen(), 2);

        for i in 0..100 {
            reservoir.add(if i % 2 == 0 { "c" } else { "d" }, &mut rng);
        }
        assert_eq!(reservoir.len(), 2);
        assert_eq!(reservoir.seen(), 102);
    }

    #[test]
    fn test_zero_capacity_counts_only() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        let mut reservoir = ReservoirSampler::new(0);
        for i in 0..10 {
            reservoir.add(i, &mut rng);
        }
        assert!(reservoir.is_empty());
        assert_eq!(reservoir.seen(), 10);
    }

    #[test]
    fn test_same_seed_same_sample() {
        let run = |seed| {
            let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
            let mut reservoir = ReservoirSampler::new(5);
            for i in 0..500 {
                reservoir.add(i, &mut rng);
            }
            reservoir.into_items()
        };
        assert_eq!(run(42), run(42));
    }
}
