// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Declarative bitflag sets used by resource usage and shader visibility masks.

/// Declares a copyable bitflag set with the usual set operations.
#[macro_export]
#[doc(hidden)]
macro_rules! beast_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// No flags set.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Wraps raw bits, keeping unknown ones.
            pub const fn from_bits_truncate(bits: $ty) -> Self {
                Self { bits }
            }

            /// Raw bit value.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Whether no flag is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Whether every flag of `other` is set.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Whether at least one flag of `other` is set.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Sets the flags of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears the flags of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut remaining = self.bits;
                let mut names = f.debug_set();
                $(
                    if $flag_value != 0 && (remaining & $flag_value) == $flag_value {
                        names.entry(&format_args!("{}", stringify!($flag_name)));
                        remaining &= !$flag_value;
                    }
                )*
                if remaining != 0 {
                    names.entry(&format_args!("{:#x}", remaining));
                }
                names.finish()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::beast_bitflags;

    beast_bitflags! {
        /// Flags used only by these tests.
        pub struct Access: u8 {
            const READ = 1 << 0;
            const WRITE = 1 << 1;
            const READ_WRITE = (1 << 0) | (1 << 1);
        }
    }

    #[test]
    fn combined_flags_contain_their_parts() {
        let rw = Access::READ | Access::WRITE;
        assert_eq!(rw, Access::READ_WRITE);
        assert!(rw.contains(Access::READ));
        assert!(!Access::READ.contains(rw));
        assert!(Access::READ.intersects(rw));
    }

    #[test]
    fn insert_and_remove() {
        let mut flags = Access::EMPTY;
        assert!(flags.is_empty());
        flags.insert(Access::WRITE);
        assert!(flags.contains(Access::WRITE));
        flags.remove(Access::WRITE);
        assert!(flags.is_empty());
    }

    #[test]
    fn debug_lists_named_flags() {
        let text = format!("{:?}", Access::WRITE);
        assert_eq!(text, "{WRITE}");
    }
}
