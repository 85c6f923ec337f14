/// Vector with stable indices and a free list threaded through the holes, so
/// a released index is handed out again by the next insert.
#[derive(Debug)]
pub struct SlotMap<T> {
    head: Option<usize>,
    entries: Vec<Slot<T>>,
    len: usize,
}
#[derive(Debug)]
enum Slot<T> {
    Occupied(T),
    Free { next: Option<usize> },
}
impl<T> SlotMap<T> {
    pub fn new() -> Self {
        Self {
            head: None,
            entries: vec![],
            len: 0,
        }
    }
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn get(&mut self, i: usize) -> Option<&mut T> {
        match self.entries.get_mut(i) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }
    /// The index the next [`insert`](Self::insert) will use.
    pub fn next_idx(&self) -> usize {
        self.head.unwrap_or(self.entries.len())
    }
    pub fn insert(&mut self, value: T) -> usize {
        self.len += 1;
        match self.head {
            None => {
                self.entries.push(Slot::Occupied(value));
                self.entries.len() - 1
            }
            Some(i) => {
                match core::mem::replace(&mut self.entries[i], Slot::Occupied(value)) {
                    Slot::Free { next } => self.head = next,
                    Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
                }
                i
            }
        }
    }
    pub fn release(&mut self, i: usize) -> Option<T> {
        let slot = self.entries.get_mut(i)?;
        if matches!(slot, Slot::Free { .. }) {
            return None;
        }
        let Slot::Occupied(value) = core::mem::replace(slot, Slot::Free { next: self.head }) else {
            return None;
        };
        self.head = Some(i);
        self.len -= 1;
        Some(value)
    }
}
