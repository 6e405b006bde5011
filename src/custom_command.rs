//! Custom commands (§4.9, Design Notes §9): user-supplied functions attached
//! to a cache at construction and invoked by name via `invoke`.
//!
//! Grounded in the Design Notes' "custom commands as user-supplied functions
//! stored by name → a map from command name to a `CustomCommand` enum with
//! two variants (`Read(Fn)`, `Write(Fn)`)". A command's result is independent
//! of the cache's stored value type `V` (§6 scenario 6: `:lpop` against a
//! list-valued cache returns the popped scalar, not the list) — the result is
//! erased to `Box<dyn Any + Send>` here and downcast back to its concrete
//! type at the `invoke` call site, the same type-erasure shape this crate
//! already uses for [`crate::registry::Registry`].

use std::any::Any;
use std::sync::Arc;

/// A read command receives the current value (`None` if the key is absent)
/// and returns the caller-visible result, boxed; it never writes back.
pub type ReadFn<V> = Arc<dyn Fn(Option<&V>) -> Box<dyn Any + Send> + Send + Sync>;

/// A write command receives the current value and returns `(boxed result,
/// new_value)`. The dispatcher writes `new_value` back under the key's lock
/// — unless the entry was absent and `new_value` is `None`, in which case no
/// write occurs (§4.9).
pub type WriteFn<V> = Arc<dyn Fn(Option<&V>) -> (Box<dyn Any + Send>, Option<V>) + Send + Sync>;

/// One command attached at construction (§3: `commands`).
#[derive(Clone)]
pub enum CustomCommand<V> {
    Read(ReadFn<V>),
    Write(WriteFn<V>),
}

impl<V> CustomCommand<V> {
    /// `f`'s return type `R` becomes the type `invoke::<R>` must be called
    /// with to read this command's result back out.
    pub fn read<R>(f: impl Fn(Option<&V>) -> R + Send + Sync + 'static) -> Self
    where
        R: Send + 'static,
    {
        CustomCommand::Read(Arc::new(move |current| Box::new(f(current)) as Box<dyn Any + Send>))
    }

    pub fn write<R>(f: impl Fn(Option<&V>) -> (R, Option<V>) + Send + Sync + 'static) -> Self
    where
        R: Send + 'static,
    {
        CustomCommand::Write(Arc::new(move |current| {
            let (result, new_value) = f(current);
            (Box::new(result) as Box<dyn Any + Send>, new_value)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_command_does_not_need_a_value_to_return_one() {
        let cmd: CustomCommand<i32> = CustomCommand::read(|v| v.copied().unwrap_or(0));
        match cmd {
            CustomCommand::Read(f) => assert_eq!(*f(None).downcast::<i32>().unwrap(), 0),
            CustomCommand::Write(_) => panic!("expected Read"),
        }
    }

    #[test]
    fn write_command_result_type_can_differ_from_the_stored_value_type() {
        // Stored value is a list; the popped-head result is a scalar.
        let cmd: CustomCommand<Vec<i32>> = CustomCommand::write(|v: Option<&Vec<i32>>| match v {
            Some(list) if !list.is_empty() => {
                let mut rest = list.clone();
                let head = rest.remove(0);
                (head, Some(rest))
            }
            _ => (0, None),
        });
        match cmd {
            CustomCommand::Write(f) => {
                let (result, new_value) = f(None);
                assert_eq!(*result.downcast::<i32>().unwrap(), 0);
                assert_eq!(new_value, None);
            }
            CustomCommand::Read(_) => panic!("expected Write"),
        }
    }
}
