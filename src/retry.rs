//! Bounded-retry combinator shared by the claim subsystem.

/// Outcome of one attempt inside [`with_retry`].
#[derive(Debug)]
pub enum Attempt<T> {
    /// The operation finished, stop retrying.
    Done(T),
    /// There is nothing to operate on; retrying would not help.
    Empty,
    /// Lost a race or hit a transient fault, try again.
    Contended,
    /// Unrecoverable fault, surface it to the caller.
    Failed(anyhow::Error),
}

/// Runs `op` until it yields [`Attempt::Done`] or the attempt budget is
/// spent. Contention burns one attempt; an empty result stops immediately.
pub fn with_retry<T, F>(max_attempts: usize, mut op: F) -> anyhow::Result<Option<T>>
where
    F: FnMut(usize) -> Attempt<T>,
{
    for attempt in 0..max_attempts {
        match op(attempt) {
            Attempt::Done(v) => return Ok(Some(v)),
            Attempt::Empty => return Ok(None),
            Attempt::Contended => {}
            Attempt::Failed(e) => return Err(e),
        }
    }
    Ok(None)
}
