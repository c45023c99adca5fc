//! Generational handle arena.
//!
//! Resources handed across the C boundary are never exposed as pointers.
//! Each one lives in a slot of a [`HandleArena`] and the caller receives a
//! [`RawHandle`]: the slot index plus the slot's generation at insert time.
//! A slot's generation changes every time it is reused, so a handle that
//! outlives its resource can never resolve to the slot's next occupant.
//!
//! Generations never wrap. A slot whose generation reaches the largest
//! packable value is retired instead of reused, which on 32-bit targets
//! (16-bit generations) costs one slot per 65535 reuses.

/// Bits available for each of index and generation in a packed handle.
const FIELD_BITS: u32 = usize::BITS / 2;

/// Largest index or generation representable in a packed handle.
const FIELD_MAX: u32 = if FIELD_BITS >= 32 {
    u32::MAX
} else {
    (1u32 << FIELD_BITS) - 1
};

/// Index plus generation identifying one arena slot occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle {
    index: u32,
    generation: u32,
}

impl RawHandle {
    /// Returns the slot index.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation.
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Packs the handle into one pointer-width integer.
    ///
    /// The low half holds the index and the high half the generation.
    /// Generations start at 1, so the packed value is never zero.
    pub fn pack(self) -> usize {
        ((self.generation as usize) << FIELD_BITS) | self.index as usize
    }

    /// Unpacks a value produced by [`RawHandle::pack`].
    ///
    /// Returns `None` for zero and for values with a zero generation,
    /// neither of which any arena ever issues.
    pub fn unpack(value: usize) -> Option<Self> {
        let mask = FIELD_MAX as usize;
        let index = (value & mask) as u32;
        let generation = ((value >> FIELD_BITS) & mask) as u32;
        (generation != 0).then_some(Self { index, generation })
    }
}


#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A slot arena addressed by generational handles.
#[derive(Debug)]
pub struct HandleArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    max_generation: u32,
}

impl<T> Default for HandleArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleArena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            max_generation: FIELD_MAX,
        }
    }

    #[cfg(test)]
    fn with_max_generation(max_generation: u32) -> Self {
        Self {
            max_generation,
            ..Self::new()
        }
    }

    /// Returns a vacated slot to the free list unless its generation is
    /// exhausted.
    fn release(&mut self, index: u32) {
        if self.slots[index as usize].generation < self.max_generation {
            self.free.push(index);
        }
    }

    /// Stores a value and returns its handle.
    ///
    /// Returns `None` when every representable index is occupied.
    pub fn insert(&mut self, value: T) -> Option<RawHandle> {
        let handle = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.value = Some(value);
            RawHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len())
                .ok()
                .filter(|i| *i <= FIELD_MAX)?;
            self.slots.push(Slot {
                generation: 1,
                value: Some(value),
            });
            RawHandle {
                index,
                generation: 1,
            }
        };
        self.len += 1;
        Some(handle)
    }

    /// Returns the value for a live handle.
    pub fn get(&self, handle: RawHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Returns a mutable reference to the value for a live handle.
    pub fn get_mut(&mut self, handle: RawHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Removes and returns the value for a live handle.
    ///
    /// A second removal with the same handle returns `None`.
    pub fn remove(&mut self, handle: RawHandle) -> Option<T> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?;
        let value = slot.value.take()?;
        self.release(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Returns true if the handle resolves to a live value.
    pub fn contains(&self, handle: RawHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Returns the number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no values are live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes every live value, returning them in slot order.
    ///
    /// Outstanding handles stay invalid after the slots are reused.
    pub fn drain(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.len);
        let mut vacated = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                drained.push(value);
                vacated.push(index as u32);
            }
        }
        for index in vacated {
            self.release(index);
        }
        self.len = 0;
        drained
    }
}
