//! Circular dependency detection infrastructure.
//!
//! Builders run synchronously on the thread that asked for them, so a
//! thread-local stack of the slots currently under construction is enough to
//! spot a builder that (transitively) asks for itself.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::key::SlotKey;

const MAX_DEPTH: usize = 1024;

thread_local! {
    static RESOLUTION_TLS: RefCell<Vec<SlotKey>> = const { RefCell::new(Vec::new()) };
}

/// Guard for managing the thread-local resolution stack
pub(crate) struct StackGuard {
    slot: SlotKey,
}

impl StackGuard {
    pub(crate) fn enter(slot: SlotKey) -> DiResult<Self> {
        RESOLUTION_TLS.with(|tls| {
            let mut stack = tls.borrow_mut();

            // Circular detection BEFORE pushing the new slot
            if let Some(start) = stack.iter().position(|s| *s == slot) {
                let mut path: Vec<&'static str> =
                    stack[start..].iter().map(|s| s.concrete.name).collect();
                path.push(slot.concrete.name);
                return Err(DiError::Circular(path));
            }

            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }

            stack.push(slot);
            Ok(Self { slot })
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            let popped = tls.borrow_mut().pop();
            debug_assert_eq!(popped, Some(self.slot));
        });
    }
}

/// Execute a builder with circular dependency detection
pub(crate) fn with_circular_check<T, F>(slot: SlotKey, f: F) -> DiResult<T>
where
    F: FnOnce() -> DiResult<T>,
{
    let _guard = StackGuard::enter(slot)?;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{Concrete, Key};

    struct A;
    struct B;

    fn slot<C: 'static>() -> SlotKey {
        SlotKey::new(Key::of::<C>(), Concrete::of::<C>())
    }

    #[test]
    fn nested_distinct_slots_are_fine() {
        let result = with_circular_check(slot::<A>(), || {
            with_circular_check(slot::<B>(), || Ok(42))
        });
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn reentering_a_slot_reports_the_cycle() {
        let result: DiResult<()> = with_circular_check(slot::<A>(), || {
            with_circular_check(slot::<B>(), || with_circular_check(slot::<A>(), || Ok(())))
        });
        match result {
            Err(DiError::Circular(path)) => {
                assert_eq!(path.len(), 3);
                assert!(path[0].ends_with("::A"));
                assert!(path[1].ends_with("::B"));
                assert!(path[2].ends_with("::A"));
            }
            other => panic!("expected circular error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn stack_unwinds_after_errors() {
        let _ = with_circular_check(slot::<A>(), || -> DiResult<()> {
            Err(DiError::NotFound("x"))
        });
        // A is no longer on the stack
        assert!(with_circular_check(slot::<A>(), || Ok(())).is_ok());
    }
}
