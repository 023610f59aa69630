mod health;
mod status;
mod transcribe;

pub use health::health;
pub use status::job_status;
pub use transcribe::submit;
