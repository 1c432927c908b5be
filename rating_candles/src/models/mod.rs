pub mod day_bar;
pub mod observation;
pub mod perf_type;
pub mod request_params;
pub mod series;
