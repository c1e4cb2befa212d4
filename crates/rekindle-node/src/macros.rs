/// Generate big-endian accessors over a node's raw byte block.
///
/// The node type must have one lifetime parameter and provide
/// `fn raw(&self) -> &[u8]` and `fn raw_mut(&mut self) -> &mut [u8]`, where
/// `raw_mut` invalidates the node. Each entry produces a getter, a setter,
/// and a row in `declared_fields` / `assign_declared_field`.
///
/// ```ignore
/// be_fields! {
///     Emitter {
///         /// Emitter lifetime in frames.
///         emit_life, set_emit_life: u16 = 0x08;
///     }
/// }
/// ```
#[macro_export]
macro_rules! be_fields {
    ($ty:ident {
        $(
            $(#[$meta:meta])*
            $name:ident, $setter:ident : $fty:ty = $offset:expr;
        )*
    }) => {
        impl $ty<'_> {
            $(
                $(#[$meta])*
                #[inline]
                pub fn $name(&self) -> $fty {
                    $crate::field::read_raw::<$fty>(self.raw(), $offset)
                }

                #[inline]
                pub fn $setter(&mut self, value: $fty) {
                    $crate::field::write_raw::<$fty>(self.raw_mut(), $offset, value);
                }
            )*

            /// Smallest raw block that covers every declared field.
            pub const DECLARED_END: usize = {
                let mut end = 0usize;
                $(
                    let field_end = $offset
                        + <$fty as $crate::__private::BigEndianCodec>::WIDTH;
                    if field_end > end {
                        end = field_end;
                    }
                )*
                end
            };

            /// The fixed-offset fields in declaration order.
            pub fn declared_fields(&self) -> ::std::vec::Vec<$crate::Field> {
                ::std::vec![
                    $( $crate::Field::at(stringify!($name), $offset, self.$name()), )*
                ]
            }

            /// Assign a fixed-offset field by name. Returns `false` when no
            /// declared field has that name.
            pub fn assign_declared_field(
                &mut self,
                name: &str,
                value: $crate::FieldValue,
            ) -> $crate::Result<bool> {
                match name {
                    $(
                        stringify!($name) => {
                            self.$setter(::core::convert::TryInto::try_into(value)?);
                            Ok(true)
                        }
                    )*
                    _ => Ok(false),
                }
            }
        }
    };
}
