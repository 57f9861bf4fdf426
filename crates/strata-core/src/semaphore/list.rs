//! Semaphore/payload pairs.

use super::Semaphore;
use crate::error::{HalError, Result};
use std::sync::Arc;

/// Borrowed list of semaphores paired with payload values.
///
/// The list retains nothing: both slices belong to the caller, who keeps the
/// semaphores alive for as long as the list is used.
#[derive(Debug, Clone, Copy)]
pub struct SemaphoreList<'a> {
    semaphores: &'a [Arc<dyn Semaphore>],
    payload_values: &'a [u64],
}

impl<'a> SemaphoreList<'a> {
    /// Pairs `semaphores[i]` with `payload_values[i]`.
    pub fn new(semaphores: &'a [Arc<dyn Semaphore>], payload_values: &'a [u64]) -> Result<Self> {
        if semaphores.len() != payload_values.len() {
            return Err(HalError::invalid_argument(format!(
                "semaphore list has {} semaphores but {} payload values",
                semaphores.len(),
                payload_values.len()
            )));
        }
        Ok(Self {
            semaphores,
            payload_values,
        })
    }

    /// List with no entries.
    pub const fn empty() -> Self {
        Self {
            semaphores: &[],
            payload_values: &[],
        }
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.semaphores.len()
    }

    /// Whether the list has no pairs.
    pub fn is_empty(&self) -> bool {
        self.semaphores.is_empty()
    }

    /// The semaphores, in list order.
    pub fn semaphores(&self) -> &'a [Arc<dyn Semaphore>] {
        self.semaphores
    }

    /// Target value of each semaphore, in list order.
    pub fn payload_values(&self) -> &'a [u64] {
        self.payload_values
    }

    /// Iterates `(semaphore, payload_value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'a Arc<dyn Semaphore>, u64)> + 'a {
        self.semaphores
            .iter()
            .zip(self.payload_values.iter().copied())
    }

    /// Signals every semaphore to its payload value.
    ///
    /// All semaphores are attempted; the first error is returned.
    pub fn signal_all(&self) -> Result<()> {
        let mut first_error = None;
        for (semaphore, value) in self.iter() {
            if let Err(err) = semaphore.signal(value) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Fails every semaphore with `status`.
    pub fn fail_all(&self, status: &HalError) {
        for semaphore in self.semaphores {
            semaphore.fail(status.clone());
        }
    }
}

impl Default for SemaphoreList<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Owned counterpart of [`SemaphoreList`], for work that outlives the caller.
#[derive(Debug, Clone, Default)]
pub struct SemaphoreSet {
    semaphores: Vec<Arc<dyn Semaphore>>,
    payload_values: Vec<u64>,
}

impl SemaphoreSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pair, returning the set for chaining.
    #[must_use]
    pub fn with(mut self, semaphore: Arc<dyn Semaphore>, value: u64) -> Self {
        self.push(semaphore, value);
        self
    }

    /// Appends a `(semaphore, value)` pair.
    pub fn push(&mut self, semaphore: Arc<dyn Semaphore>, value: u64) {
        self.semaphores.push(semaphore);
        self.payload_values.push(value);
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.semaphores.len()
    }

    /// Whether the set has no pairs.
    pub fn is_empty(&self) -> bool {
        self.semaphores.is_empty()
    }

    /// Borrows the set as a list.
    pub fn as_list(&self) -> SemaphoreList<'_> {
        SemaphoreList {
            semaphores: &self.semaphores,
            payload_values: &self.payload_values,
        }
    }
}

impl FromIterator<(Arc<dyn Semaphore>, u64)> for SemaphoreSet {
    fn from_iter<I: IntoIterator<Item = (Arc<dyn Semaphore>, u64)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (semaphore, value) in iter {
            set.push(semaphore, value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semaphore::HostSemaphore;

    #[test]
    fn test_length_mismatch_rejected() {
        let semaphores: Vec<Arc<dyn Semaphore>> = vec![HostSemaphore::new(0, None)];
        let err = SemaphoreList::new(&semaphores, &[1, 2]).unwrap_err();
        assert!(matches!(err, HalError::InvalidArgument { .. }));
    }

    #[test]
    fn test_signal_and_fail_all() {
        let a = HostSemaphore::new(0, None);
        let b = HostSemaphore::new(0, None);
        let set = SemaphoreSet::new().with(a.clone(), 3).with(b.clone(), 5);
        set.as_list().signal_all().unwrap();
        assert_eq!(a.query().unwrap(), 3);
        assert_eq!(b.query().unwrap(), 5);

        set.as_list().fail_all(&HalError::unknown("lost"));
        assert!(a.query().unwrap_err().is_unknown());
        assert!(b.query().unwrap_err().is_unknown());
    }

    #[test]
    fn test_empty() {
        let list = SemaphoreList::empty();
        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);
        assert!(list.signal_all().is_ok());
    }
}
