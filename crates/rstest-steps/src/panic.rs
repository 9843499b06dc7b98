//! Panic payload capture for step actions, background routines and bodies.

use std::any::Any;

use thiserror::Error;

/// A panic captured while running user code, rendered as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PanicError {
    message: String,
}

impl PanicError {
    /// Build the error from a caught panic payload.
    #[must_use]
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        Self {
            message: panic_message(payload),
        }
    }

    /// Returns the rendered panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Extracts a panic payload into a human-readable message.
///
/// # Examples
/// ```
/// use rstest_steps::panic_message;
///
/// let err = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
/// assert_eq!(panic_message(err.as_ref()), "boom");
/// ```
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    macro_rules! try_downcast {
        ($($ty:ty),* $(,)?) => {
            $(
                if let Some(val) = payload.downcast_ref::<$ty>() {
                    return val.to_string();
                }
            )*
        };
    }

    try_downcast!(&str, String, i32, u32, i64, u64, isize, usize);
    format!(
        "opaque panic payload (TypeId({:?}))",
        payload.type_id()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_panics_keep_their_message() {
        let Err(payload) = std::panic::catch_unwind(|| panic!("value was {}", 3)) else {
            panic!("closure should panic");
        };
        assert_eq!(PanicError::from_payload(payload.as_ref()).message(), "value was 3");
    }

    #[test]
    fn numeric_payloads_are_rendered() {
        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), "42");
    }

    #[test]
    fn opaque_payloads_mention_type_id() {
        struct Opaque;
        let payload: Box<dyn Any + Send> = Box::new(Opaque);
        assert!(panic_message(payload.as_ref()).starts_with("opaque panic payload"));
    }
}
