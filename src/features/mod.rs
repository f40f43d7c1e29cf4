pub mod palette;
pub mod phash;
pub mod thumbs;
