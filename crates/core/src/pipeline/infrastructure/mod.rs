pub mod result_sinks;
pub mod threaded_frame_pipeline;
