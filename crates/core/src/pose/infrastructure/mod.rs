pub mod synthetic_pose_detector;
pub mod threaded_frame_analyzer;
