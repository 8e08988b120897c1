pub mod file_service;
pub mod user_service;

pub use file_service::{FileDownload, FileService, SweepReport, UploadInput};
pub use user_service::UserService;
