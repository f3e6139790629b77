//! Root-object propagation.
//!
//! A field-level expression such as `root.start < root.end` needs the object
//! that contains the field, but a validation driver calls field checks one value
//! at a time. The driver publishes the object under validation with
//! [`ContextPropagator::enter`] or [`ContextPropagator::with_root`], and
//! expression checks read it back with [`ContextPropagator::current`].
//!
//! Roots live on a thread-local stack. Entering returns a [`RootGuard`] whose
//! drop restores the stack to the depth it had before the enter, so a frame is
//! released on every exit path including unwinding. Nested validation pushes its
//! own frame and sees its own root until that frame is released.
//!
//! The guard is `!Send`: a frame must be released on the thread that pushed it.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use winter_lang::Value;

thread_local! {
    static ROOTS: RefCell<Vec<Arc<Value>>> = const { RefCell::new(Vec::new()) };
}

/// Access to the calling thread's root-object stack.
pub struct ContextPropagator;

impl ContextPropagator {
    /// Push `root` and return the guard that pops it.
    pub fn enter(root: impl Into<Arc<Value>>) -> RootGuard {
        let root = root.into();
        let depth = ROOTS.with(|roots| {
            let mut roots = roots.borrow_mut();
            let depth = roots.len();
            roots.push(root);
            depth
        });
        RootGuard {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Run `body` with `root` published, releasing the frame afterwards.
    pub fn with_root<R>(root: impl Into<Arc<Value>>, body: impl FnOnce() -> R) -> R {
        let _guard = Self::enter(root);
        body()
    }

    /// The most recently entered root, if any.
    pub fn current() -> Option<Arc<Value>> {
        ROOTS.with(|roots| roots.borrow().last().cloned())
    }

    /// Number of live frames on this thread.
    pub fn depth() -> usize {
        ROOTS.with(|roots| roots.borrow().len())
    }
}

/// Releases a root frame when dropped.
///
/// Guards must be released in the reverse order of [`ContextPropagator::enter`].
/// Dropping an outer guard first also releases every frame above it, including
/// frames of inner guards that are still alive. [`ContextPropagator::with_root`]
/// always releases in order; debug builds assert the order for hand-held guards.
#[must_use = "the root is released as soon as the guard is dropped"]
pub struct RootGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl RootGuard {
    /// Release the frame now.
    pub fn exit(self) {}

    /// Stack depth this guard restores on release.
    pub fn restores_to(&self) -> usize {
        self.depth
    }
}

impl Drop for RootGuard {
    fn drop(&mut self) {
        // Truncate rather than pop: a guard leaked with mem::forget inside this
        // scope must not leave its frame behind once the outer scope ends.
        let _ = ROOTS.try_with(|roots| {
            let mut roots = roots.borrow_mut();
            debug_assert!(
                roots.len() > self.depth || std::thread::panicking(),
                "root guards released out of order"
            );
            roots.truncate(self.depth);
        });
    }
}

impl std::fmt::Debug for RootGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootGuard")
            .field("depth", &self.depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn named(name: &str) -> Value {
        Value::object([("name", Value::from(name))])
    }

    fn current_name() -> Option<String> {
        ContextPropagator::current()
            .and_then(|root| root.get("name").and_then(|v| v.as_str().map(str::to_string)))
    }

    #[test]
    fn test_empty_stack() {
        assert!(ContextPropagator::current().is_none());
        assert_eq!(ContextPropagator::depth(), 0);
    }

    #[test]
    fn test_nested_scopes_restore_outer_root() {
        ContextPropagator::with_root(named("a"), || {
            assert_eq!(current_name().as_deref(), Some("a"));
            ContextPropagator::with_root(named("b"), || {
                assert_eq!(current_name().as_deref(), Some("b"));
                assert_eq!(ContextPropagator::depth(), 2);
            });
            assert_eq!(current_name().as_deref(), Some("a"));
        });
        assert!(ContextPropagator::current().is_none());
    }

    #[test]
    fn test_guard_released_on_panic() {
        let result = catch_unwind(AssertUnwindSafe(|| {
            ContextPropagator::with_root(named("a"), || panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(ContextPropagator::depth(), 0);
    }

    #[test]
    fn test_explicit_exit() {
        let guard = ContextPropagator::enter(named("a"));
        assert_eq!(guard.restores_to(), 0);
        assert_eq!(ContextPropagator::depth(), 1);
        guard.exit();
        assert_eq!(ContextPropagator::depth(), 0);
    }

    #[test]
    fn test_forgotten_inner_guard_is_cleaned_by_outer() {
        let outer = ContextPropagator::enter(named("a"));
        std::mem::forget(ContextPropagator::enter(named("b")));
        assert_eq!(ContextPropagator::depth(), 2);
        drop(outer);
        assert_eq!(ContextPropagator::depth(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "root guards released out of order")]
    fn test_out_of_order_release_is_caught() {
        let outer = ContextPropagator::enter(named("a"));
        let inner = ContextPropagator::enter(named("b"));
        drop(outer);
        assert_eq!(ContextPropagator::depth(), 0);
        drop(inner);
    }

    #[test]
    fn test_stacks_are_thread_confined() {
        ContextPropagator::with_root(named("main"), || {
            let other = std::thread::spawn(|| {
                assert!(ContextPropagator::current().is_none());
                ContextPropagator::with_root(named("worker"), current_name)
            })
            .join()
            .unwrap();
            assert_eq!(other.as_deref(), Some("worker"));
            assert_eq!(current_name().as_deref(), Some("main"));
        });
    }
}
