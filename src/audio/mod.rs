pub mod capture;
pub mod codec;
pub mod output;
pub mod playback;
