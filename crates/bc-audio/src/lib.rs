// Audio capture, windowing, band-power analysis, and normalization for bandcast.

pub mod capture;
pub mod capture_loop;
pub mod decode;
pub mod file_source;
pub mod normalize;
pub mod spectral;
pub mod window;
