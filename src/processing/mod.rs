pub mod alpha_mask;
pub mod bitmap;
pub mod layout;
pub mod region;
pub mod resample;
pub mod transform;
