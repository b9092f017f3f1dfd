mod normalize;
mod vector;

pub use normalize::normalize;
pub use vector::{decode_vector, dot, encode_vector, l2_normalize};
