pub mod frame_pool;
pub mod image_directory_source;
pub mod synthetic_camera_source;
