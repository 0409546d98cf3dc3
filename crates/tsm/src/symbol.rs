//! Naming of state and event values.
//!
//! States and events come from closed, enumerable sets. The engine only needs
//! to compare them, but log lines and trace records are far more useful with a
//! readable name attached, so both sets implement [`Symbol`]. The name is never
//! consulted when choosing a transition.

use core::fmt;

/// A value from a closed set of states or events.
pub trait Symbol: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Stable human-readable name of this value.
    fn name(&self) -> &'static str;
}

/// Declares a field-less enum usable as a state or event set.
///
/// The generated type derives `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq` and
/// `Hash`, implements [`Symbol`] and `Display` using the variant identifier,
/// and exposes `ALL` with every variant in declaration order.
///
/// ```
/// tsm::symbols! {
///     /// Door contact.
///     pub enum Door { Open, Closed }
/// }
///
/// use tsm::Symbol;
/// assert_eq!(Door::Open.name(), "Open");
/// assert_eq!(Door::ALL, &[Door::Open, Door::Closed]);
/// ```
#[macro_export]
macro_rules! symbols {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every value of the set, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl $crate::symbol::Symbol for $name {
            fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str($crate::symbol::Symbol::name(self))
            }
        }
    };
}
