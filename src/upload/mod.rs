pub mod file;
pub mod flow;

pub use file::SelectedFile;
pub use flow::UploadFlow;
