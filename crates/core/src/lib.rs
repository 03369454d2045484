pub mod config;

pub mod capture {
    pub mod domain {
        pub mod frame_source;
        pub mod resolution;
    }
    pub mod infrastructure;
}

pub mod pose {
    pub mod domain {
        pub mod frame_analyzer;
        pub mod pose;
        pub mod pose_detector;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod delivery_state;
    pub mod pipeline_logger;
    pub mod stream_pose_use_case;
    pub mod domain {
        pub mod result_sink;
    }
    pub mod infrastructure;
}

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod permission;
}
