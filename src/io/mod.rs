/// The fetch and image collaborators the decoders stay agnostic of, plus the
/// relative-path rules shared by every format.
pub mod image;
pub mod path;
pub mod source;
