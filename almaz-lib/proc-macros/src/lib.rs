use proc_macro::TokenStream;
mod opcode;

/// Used on the OpCode enum.
///
/// An opcode is basically an id paired with an optional operand, and enums lend themselves
/// naturally to this usecase, however the opcodes have to exist as a byte sequence inside a
/// module image. So the enum is encoded as a little endian u16 discriminant, followed by the
/// bytes of its operand. All variants must have zero or one unnamed field, and the field type
/// must implement `crate::core::Operand`.
///
/// This Macro generates the following:
/// * an associated `u16` const for each variant, named like the variant in upper case
/// * Self::get_id(&self) -> u16
/// * Self::to_bytes(&self) -> `Vec<u8>`
/// * Self::serialized_size(&self) -> usize
/// * Self::serialized_size_of(u16) -> `Option<usize>`
/// * Self::from_bytes(&[u8]) -> `Option<Self>`
///   decodes the opcode at the start of the slice, trailing bytes are ignored
#[proc_macro_derive(OpCode)]
pub fn convert(tokens: TokenStream) -> TokenStream {
    opcode::opcode_impl(tokens)
}
